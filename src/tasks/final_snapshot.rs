//! Snapshot selection for the FINAL announcement.
//!
//! The page keeps changing until the anchor, so the run polls it on a fixed
//! interval and keeps the newest good capture taken before the anchor. Polling
//! stops once a capture lands inside the lead window (or the anchor arrives),
//! and the machine then holds until the anchor so the publish never fires early.
//! When the wait budget runs out before the anchor the run fails instead.
//!
//! ```text
//! WaitingForSnapshot ──capture in lead window──▶ GotSnapshotNearAnchor
//!        │                                              │
//!        ├──deadline, have snapshot──▶ WaitingForAnchor ◀┘
//!        │                                   │
//!        └──deadline, nothing──▶ LastResort ─┘──▶ ReadyToPublish
//! ```

use crate::error::ScrapeError;
use crate::models::{AnchorSpec, VoteSnapshot};
use crate::scrape::SnapshotSource;
use crate::tasks::anchor::wait_until;
use crate::tasks::clock::{Clock, until};
use chrono::{DateTime, FixedOffset};
use log::{debug, info, warn};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalState {
    WaitingForSnapshot { last_good: Option<VoteSnapshot> },
    GotSnapshotNearAnchor(VoteSnapshot),
    WaitingForAnchor(VoteSnapshot),
    LastResort,
    ReadyToPublish(VoteSnapshot),
}

pub struct FinalSnapshotMachine<'a> {
    clock: &'a dyn Clock,
    source: &'a dyn SnapshotSource,
    anchor: DateTime<FixedOffset>,
    lead: chrono::Duration,
    poll_interval: Duration,
    // Polling and the anchor wait both end here at the latest
    budget_end: DateTime<FixedOffset>,
    attempts: usize,
}

impl<'a> FinalSnapshotMachine<'a> {
    pub fn new(
        clock: &'a dyn Clock,
        source: &'a dyn SnapshotSource,
        spec: &AnchorSpec,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Self {
        let started = clock.now();
        let budget = chrono::Duration::from_std(max_wait).unwrap_or_else(|_| chrono::Duration::days(365));
        let budget_end = started.checked_add_signed(budget).unwrap_or(spec.target_instant);
        Self {
            clock,
            source,
            anchor: spec.target_instant,
            lead: chrono::Duration::try_seconds(spec.pre_snapshot_lead_seconds.max(0))
                .unwrap_or_else(|| chrono::Duration::days(365)),
            poll_interval,
            budget_end,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Drive the machine to `ReadyToPublish` and hand back the chosen snapshot.
    pub async fn run(&mut self) -> Result<VoteSnapshot, ScrapeError> {
        let mut state = FinalState::WaitingForSnapshot { last_good: None };
        loop {
            state = match self.step(state).await? {
                FinalState::ReadyToPublish(snapshot) => return Ok(snapshot),
                next => next,
            };
        }
    }

    pub async fn step(&mut self, state: FinalState) -> Result<FinalState, ScrapeError> {
        match state {
            FinalState::WaitingForSnapshot { last_good } => Ok(self.poll(last_good).await),
            FinalState::GotSnapshotNearAnchor(snapshot) => {
                info!(
                    "Snapshot from {} is within {}s of the anchor; polling stops",
                    snapshot.captured_at().to_rfc3339(),
                    self.lead.num_seconds()
                );
                Ok(FinalState::WaitingForAnchor(snapshot))
            }
            FinalState::WaitingForAnchor(snapshot) => {
                let budget_left = until(self.clock.now(), self.budget_end);
                if !wait_until(self.clock, self.anchor, budget_left).await {
                    return Err(ScrapeError::AnchorNotReached { anchor: self.anchor });
                }
                Ok(FinalState::ReadyToPublish(snapshot))
            }
            FinalState::LastResort => {
                warn!("No snapshot captured while polling; one last scrape attempt");
                self.attempts += 1;
                let snapshot = self.source.capture().await?;
                if snapshot.captured_at() >= self.anchor {
                    warn!(
                        "Last-resort snapshot captured at {}, after the anchor {}",
                        snapshot.captured_at().to_rfc3339(),
                        self.anchor.to_rfc3339()
                    );
                }
                Ok(FinalState::WaitingForAnchor(snapshot))
            }
            ready @ FinalState::ReadyToPublish(_) => Ok(ready),
        }
    }

    // One poll: maybe capture, then either leave the loop or sleep one interval
    async fn poll(&mut self, mut last_good: Option<VoteSnapshot>) -> FinalState {
        let deadline = self.anchor.min(self.budget_end);
        if self.clock.now() >= deadline {
            return match last_good {
                Some(snapshot) => FinalState::WaitingForAnchor(snapshot),
                None => FinalState::LastResort,
            };
        }

        self.attempts += 1;
        match self.source.capture().await {
            Ok(snapshot) if snapshot.captured_at() < self.anchor => {
                debug!(
                    "Attempt {} captured {} records at {}",
                    self.attempts,
                    snapshot.total_records(),
                    snapshot.captured_at().to_rfc3339()
                );
                last_good = Some(snapshot);
            }
            Ok(snapshot) => {
                warn!(
                    "Attempt {} finished at {}, past the anchor; keeping the previous snapshot",
                    self.attempts,
                    snapshot.captured_at().to_rfc3339()
                );
            }
            Err(e) => {
                warn!("Attempt {} failed, keeping last good snapshot: {}", self.attempts, e);
            }
        }

        if let Some(snapshot) = last_good.as_ref().filter(|s| self.in_lead_window(s)) {
            return FinalState::GotSnapshotNearAnchor(snapshot.clone());
        }

        let pause = self.poll_interval.min(until(self.clock.now(), deadline));
        if !pause.is_zero() {
            self.clock.sleep(pause).await;
        }
        FinalState::WaitingForSnapshot { last_good }
    }

    fn in_lead_window(&self, snapshot: &VoteSnapshot) -> bool {
        let at = snapshot.captured_at();
        // A lead reaching past the representable range opens the window completely
        at < self.anchor
            && self
                .anchor
                .checked_sub_signed(self.lead)
                .is_none_or(|start| at >= start)
    }
}
