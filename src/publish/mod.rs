pub mod chart;
pub mod git;
pub mod webhook;

use crate::error::PublishError;
use crate::models::AnchorSpec;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use chart::{ChartRenderer, PngChartRenderer, load_font};
pub use git::{GitArtifactStore, LocalArtifactStore};
pub use webhook::{IftttAnnouncer, SkippedAnnouncer};

/// Somewhere rendered files become public (a pushed git branch, or just disk).
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn persist(&self, path: &Path, message: &str) -> Result<(), PublishError>;
    fn public_url(&self, artifact: &Path) -> Result<String, PublishError>;
}

#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, announcement: &Announcement) -> Result<(), PublishError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub body: String,
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub path: PathBuf,
    pub url: String,
}

// Fixed text around the date and time of each announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementTemplate {
    pub headline: String,
    pub campaign_period: String,
    pub vote_url: String,
    pub hashtags: Vec<String>,
}

impl AnnouncementTemplate {
    pub fn compose(&self, spec: &AnchorSpec, time_label: &str) -> String {
        let month_day = spec.target_instant.format("%m/%d");
        format!(
            "🗳️エピソード投票{}（{} {}）🗳️\n\n{}\n投票はこちらから（1日1回）→ {}\n\n{}",
            self.headline,
            month_day,
            time_label,
            self.campaign_period,
            self.vote_url,
            self.hashtags.join("\n")
        )
    }
}

/// `ranking_S1S2Top{n}_{date}_{tag}.png`, dated by the anchor.
pub fn artifact_file_name(top_n: usize, spec: &AnchorSpec) -> String {
    format!(
        "ranking_S1S2Top{}_{}_{}.png",
        top_n,
        spec.target_instant.format("%Y-%m-%d"),
        spec.file_tag()
    )
}
