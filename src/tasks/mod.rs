pub mod anchor;
pub mod clock;
pub mod final_snapshot;

use crate::error::ScrapeError;
use crate::models::{AnchorSpec, VoteSnapshot};
use crate::scrape::SnapshotSource;
use chrono::{DateTime, FixedOffset};
use clock::Clock;
use final_snapshot::FinalSnapshotMachine;
use log::info;
use std::time::Duration;

/// Decides when data is captured and when the announcement may go out.
pub struct AnchorScheduler<'a> {
    clock: &'a dyn Clock,
    poll_interval: Duration,
    max_wait: Duration,
}

impl<'a> AnchorScheduler<'a> {
    pub fn new(clock: &'a dyn Clock, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            clock,
            poll_interval,
            max_wait,
        }
    }

    // Routine runs past the campaign cutoff do nothing at all
    pub fn past_cutoff(&self, spec: &AnchorSpec, cutoff: DateTime<FixedOffset>) -> bool {
        !spec.is_final() && self.clock.now() > cutoff
    }

    /// Capture the snapshot this run will publish.
    ///
    /// Routine runs scrape once, right away. FINAL runs poll until the anchor
    /// and return only once the anchor instant has arrived.
    pub async fn capture(
        &self,
        spec: &AnchorSpec,
        source: &dyn SnapshotSource,
    ) -> Result<VoteSnapshot, ScrapeError> {
        if spec.is_final() {
            info!("FINAL mode: polling for a snapshot before {}", spec.target_instant.to_rfc3339());
            let mut machine =
                FinalSnapshotMachine::new(self.clock, source, spec, self.poll_interval, self.max_wait);
            let snapshot = machine.run().await?;
            info!(
                "FINAL snapshot captured at {} after {} attempt(s)",
                snapshot.captured_at().to_rfc3339(),
                machine.attempts()
            );
            Ok(snapshot)
        } else {
            source.capture().await
        }
    }

    // Labelled routine runs hold the announcement until their checkpoint.
    // FINAL runs already reached the anchor inside `capture`.
    pub async fn hold_until_anchor(&self, spec: &AnchorSpec) {
        if spec.waits_for_anchor() && !spec.is_final() {
            anchor::wait_until(self.clock, spec.target_instant, self.max_wait).await;
        }
    }
}
