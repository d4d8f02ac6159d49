pub mod parser;

use crate::error::{FetchError, ScrapeError};
use crate::models::VoteSnapshot;
use crate::tasks::clock::Clock;
use async_trait::async_trait;
use log::debug;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;

const FETCH_TIMEOUT_SECONDS: u64 = 30;
const USER_AGENT: &str = "Mozilla/5.0";

// Where raw page HTML comes from
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Anything that can produce a fresh, timestamped snapshot on demand.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn capture(&self) -> Result<VoteSnapshot, ScrapeError>;
}

pub struct HttpPageSource {
    client: reqwest::Client,
    url: String,
}

impl HttpPageSource {
    pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECONDS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        let transport = |source| FetchError::Transport {
            url: self.url.clone(),
            source,
        };
        let response = self.client.get(&self.url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }
}

/// Flatten an HTML document to its text nodes, one trimmed non-empty node per line.
pub fn flatten_html(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|node| !node.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// Fetch + flatten + parse, stamped with the clock at parse time
pub struct PageScraper {
    source: Box<dyn PageSource>,
    clock: Arc<dyn Clock>,
    markers: Vec<String>,
}

impl PageScraper {
    pub fn new(source: Box<dyn PageSource>, clock: Arc<dyn Clock>, markers: Vec<String>) -> Self {
        Self {
            source,
            clock,
            markers,
        }
    }
}

#[async_trait]
impl SnapshotSource for PageScraper {
    async fn capture(&self) -> Result<VoteSnapshot, ScrapeError> {
        let html = self.source.fetch().await?;
        let text = flatten_html(&html);
        debug!("Flattened page to {} lines", text.lines().count());
        let snapshot = parser::parse(&text, &self.markers, self.clock.now())?;
        debug!(
            "Parsed {} records across {} groups",
            snapshot.total_records(),
            snapshot.groups().len()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeClock;

    struct StaticPage(&'static str);

    #[async_trait]
    impl PageSource for StaticPage {
        async fn fetch(&self) -> Result<String, FetchError> {
            Ok(self.0.to_string())
        }
    }

    const PAGE: &str = r#"
        <html><head><title>投票</title></head>
        <body>
          <p>『Stray』5</p>
          <section><h2>Alpha</h2>
            <ul><li><span>『Ep1』</span><b>3</b></li>
                <li><span>『Ep2』</span><b>10</b></li></ul>
          </section>
          <section><h2>Beta</h2>
            <ul><li><span>『Ep1』</span><b>7</b></li></ul>
          </section>
        </body></html>
    "#;

    #[test]
    fn flattening_puts_each_text_node_on_its_own_line() {
        let text = flatten_html("<div><p> one </p><p>two</p>\n<p></p><span>三</span></div>");
        assert_eq!(text, "one\ntwo\n三");
    }

    #[tokio::test]
    async fn captures_snapshot_from_markup() {
        let clock = Arc::new(FakeClock::at("2025-10-01T17:58:30+09:00"));
        let scraper = PageScraper::new(
            Box::new(StaticPage(PAGE)),
            clock.clone(),
            vec!["Alpha".into(), "Beta".into()],
        );
        let snapshot = scraper.capture().await.unwrap();
        assert_eq!(snapshot.group(0).len(), 2);
        assert_eq!(snapshot.group(0)[0].title, "Ep2");
        assert_eq!(snapshot.group(1)[0].count, 7);
        assert_eq!(snapshot.captured_at(), clock.now());
    }

    #[tokio::test]
    async fn unreadable_markup_is_a_parse_error() {
        let clock = Arc::new(FakeClock::at("2025-10-01T17:58:30+09:00"));
        let scraper = PageScraper::new(
            Box::new(StaticPage("<html><body><p>maintenance</p></body></html>")),
            clock,
            vec!["Alpha".into(), "Beta".into()],
        );
        assert!(matches!(scraper.capture().await, Err(ScrapeError::Parse(_))));
    }
}
