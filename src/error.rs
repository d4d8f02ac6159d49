use chrono::{DateTime, FixedOffset};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid {expected}: {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no vote records found in any group (looked for {markers:?})")]
    NoVotes { markers: Vec<String> },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`git {args}` failed: {detail}")]
    Git { args: String, detail: String },
    #[error("chart rendering failed: {0}")]
    Render(String),
    #[error("webhook call failed: {0}")]
    Webhook(String),
    #[error("{0} is not inside the repository")]
    OutsideRepository(String),
}

impl PublishError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        PublishError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

// Everything that can end a run with a non-zero exit status
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("page unreadable: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("wait budget ran out before the anchor {anchor}")]
    AnchorNotReached { anchor: DateTime<FixedOffset> },
}

// Failure of a single scrape attempt (fetch or parse)
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("wait budget ran out before the anchor {anchor}")]
    AnchorNotReached { anchor: DateTime<FixedOffset> },
}

impl From<ScrapeError> for PipelineError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::Fetch(e) => PipelineError::Fetch(e),
            ScrapeError::Parse(e) => PipelineError::Parse(e),
            ScrapeError::AnchorNotReached { anchor } => PipelineError::AnchorNotReached { anchor },
        }
    }
}
