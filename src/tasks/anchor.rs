use crate::models::{AnchorMode, AnchorSpec, RunLabel};
use crate::tasks::clock::{Clock, until};
use chrono::{DateTime, FixedOffset, NaiveTime};
use log::{info, warn};
use std::time::Duration;

// Longest single sleep while waiting for an anchor
const WAIT_SLICE: Duration = Duration::from_secs(20);

/// Build the anchor for this run.
///
/// FINAL runs use the configured instant. Routine runs map their label onto a
/// fixed wall-clock time of today's date; unlabelled runs are anchored at `now`.
pub fn resolve_anchor(
    now: DateTime<FixedOffset>,
    final_mode: bool,
    final_anchor: DateTime<FixedOffset>,
    run_label: RunLabel,
    lead_seconds: i64,
) -> AnchorSpec {
    let (mode, target_instant) = if final_mode {
        (AnchorMode::Final, final_anchor)
    } else {
        let target = run_label
            .checkpoint_hour()
            .and_then(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
            .and_then(|time| {
                now.date_naive()
                    .and_time(time)
                    .and_local_timezone(*now.offset())
                    .single()
            })
            .unwrap_or(now);
        (AnchorMode::Normal, target)
    };

    AnchorSpec {
        target_instant,
        mode,
        run_label,
        pre_snapshot_lead_seconds: lead_seconds,
    }
}

/// "H:MM時点" text used in the announcement headline.
pub fn time_label(spec: &AnchorSpec, now: DateTime<FixedOffset>) -> String {
    match (spec.mode, spec.run_label) {
        (AnchorMode::Final, _) => format!("{}時点", spec.target_instant.format("%-H:%M")),
        (AnchorMode::Normal, RunLabel::Unset) => format!("{}時点", now.format("%H:%M")),
        (AnchorMode::Normal, _) => format!("{}時点", spec.target_instant.format("%-H:%M")),
    }
}

/// Block until `target` or until `max_wait` has elapsed, whichever is first.
/// Returns true when the target was reached.
pub async fn wait_until(clock: &dyn Clock, target: DateTime<FixedOffset>, max_wait: Duration) -> bool {
    let now = clock.now();
    if now >= target {
        return true;
    }
    let needed = until(now, target);
    let mut remaining = needed.min(max_wait);
    info!("Waiting {}s for anchor {}", remaining.as_secs(), target.to_rfc3339());

    while !remaining.is_zero() {
        let slice = remaining.min(WAIT_SLICE);
        clock.sleep(slice).await;
        remaining -= slice;
    }

    let reached = clock.now() >= target;
    if !reached {
        warn!(
            "Wait ceiling of {}s hit before anchor {}",
            max_wait.as_secs(),
            target.to_rfc3339()
        );
    }
    reached
}
