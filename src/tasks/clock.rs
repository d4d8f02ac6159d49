use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use std::time::Duration;

/// Source of "now" and the only way the scheduler is allowed to wait.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
    async fn sleep(&self, duration: Duration);
}

// Wall clock rendered in the campaign's fixed offset
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// Time left until `target`, zero if it has already passed
pub fn until(now: DateTime<FixedOffset>, target: DateTime<FixedOffset>) -> Duration {
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn until_is_zero_for_past_targets() {
        let now = DateTime::parse_from_rfc3339("2025-10-01T18:00:10+09:00").unwrap();
        let target = DateTime::parse_from_rfc3339("2025-10-01T18:00:00+09:00").unwrap();
        assert_eq!(until(now, target), Duration::ZERO);
        assert_eq!(until(target, now), Duration::from_secs(10));
    }

    #[test]
    fn system_clock_reports_configured_offset() {
        let jst = FixedOffset::east_opt(9 * 3600).unwrap();
        let clock = SystemClock::new(jst);
        assert_eq!(clock.now().offset(), &jst);
    }
}
