//! Fakes shared by unit tests: a virtual clock and scripted collaborators.

use crate::error::{FetchError, PublishError, ScrapeError};
use crate::models::{VoteGroup, VoteRecord, VoteSnapshot};
use crate::publish::{Announcement, Announcer, ArtifactStore, ChartRenderer, PublishedArtifact};
use crate::scrape::SnapshotSource;
use crate::tasks::clock::Clock;
use crate::voting::RankedGroup;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn instant(raw: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(raw).unwrap()
}

pub fn snapshot(group_a: &[(&str, u32)], at: DateTime<FixedOffset>) -> VoteSnapshot {
    VoteSnapshot::new(
        vec![
            VoteGroup {
                marker: "Alpha".into(),
                records: group_a.iter().map(|(t, c)| VoteRecord::new(*t, *c)).collect(),
            },
            VoteGroup {
                marker: "Beta".into(),
                records: Vec::new(),
            },
        ],
        at,
    )
}

/// Virtual clock: `sleep` returns immediately after moving time forward.
pub struct FakeClock {
    now: Mutex<DateTime<FixedOffset>>,
    slept: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn at(raw: &str) -> Self {
        Self {
            now: Mutex::new(instant(raw)),
            slept: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }

    pub fn total_slept(&self) -> Duration {
        self.slept.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

pub enum Step {
    Votes(Vec<(&'static str, u32)>),
    Fail,
}

/// Replays scripted capture results; each capture takes `cost` of virtual time.
/// Once the script runs out every capture fails.
pub struct ScriptedSource {
    clock: Arc<FakeClock>,
    steps: Mutex<VecDeque<Step>>,
    cost: Duration,
    attempts: Mutex<usize>,
}

impl ScriptedSource {
    pub fn new(clock: Arc<FakeClock>, steps: Vec<Step>) -> Self {
        Self {
            clock,
            steps: Mutex::new(steps.into()),
            cost: Duration::ZERO,
            attempts: Mutex::new(0),
        }
    }

    pub fn with_cost(mut self, cost: Duration) -> Self {
        self.cost = cost;
        self
    }

    pub fn always(clock: Arc<FakeClock>, votes: Vec<(&'static str, u32)>) -> Self {
        let steps = (0..1000).map(|_| Step::Votes(votes.clone())).collect();
        Self::new(clock, steps)
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn capture(&self) -> Result<VoteSnapshot, ScrapeError> {
        *self.attempts.lock().unwrap() += 1;
        self.clock.advance(self.cost);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Votes(votes)) => Ok(snapshot(&votes, self.clock.now())),
            _ => Err(FetchError::Status {
                url: "https://example.test/vote/".into(),
                status: 503,
            }
            .into()),
        }
    }
}

#[derive(Default)]
pub struct RecordingRenderer {
    pub rendered: Mutex<Vec<(PathBuf, Vec<RankedGroup>)>>,
}

impl ChartRenderer for RecordingRenderer {
    fn render(&self, groups: &[RankedGroup], path: &Path) -> Result<(), PublishError> {
        self.rendered
            .lock()
            .unwrap()
            .push((path.to_path_buf(), groups.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStore {
    pub persisted: Mutex<Vec<(PathBuf, String)>>,
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    async fn persist(&self, path: &Path, message: &str) -> Result<(), PublishError> {
        self.persisted
            .lock()
            .unwrap()
            .push((path.to_path_buf(), message.to_string()));
        Ok(())
    }

    fn public_url(&self, artifact: &Path) -> Result<String, PublishError> {
        Ok(format!("https://example.test/{}", artifact.display()))
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    pub fail: bool,
    pub sent: Mutex<Vec<(Announcement, DateTime<FixedOffset>)>>,
    pub clock: Option<Arc<FakeClock>>,
}

impl RecordingAnnouncer {
    pub fn with_clock(clock: Arc<FakeClock>) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    pub fn failing(clock: Arc<FakeClock>) -> Self {
        Self {
            fail: true,
            ..Self::with_clock(clock)
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, announcement: &Announcement) -> Result<(), PublishError> {
        let at = self
            .clock
            .as_ref()
            .map(|clock| clock.now())
            .unwrap_or_else(|| instant("1970-01-01T00:00:00+00:00"));
        self.sent.lock().unwrap().push((announcement.clone(), at));
        if self.fail {
            return Err(PublishError::Webhook("status 503".into()));
        }
        Ok(())
    }
}

// File name of a published artifact
pub fn artifact_name(artifact: &PublishedArtifact) -> String {
    artifact
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
