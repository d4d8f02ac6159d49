pub mod rank;

pub use rank::{rank_order, top_n};

use crate::models::{VoteRecord, VoteSnapshot};

// Lower bound for a panel's axis so small counts still read as bars
const MIN_AXIS_MAX: u32 = 200;

// Ranked view of one group, ready for the chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedGroup {
    pub caption: String,
    pub entries: Vec<VoteRecord>,
    pub axis_max: u32,
}

impl RankedGroup {
    pub fn tick_step(&self) -> u32 {
        if self.axis_max >= 1000 { 200 } else { 100 }
    }
}

/// Axis maximum for a panel: 130% of the leader, floored to a hundred, at least 200.
pub fn axis_max(entries: &[VoteRecord]) -> u32 {
    let Some(leader) = entries.iter().map(|r| r.count).max() else {
        return MIN_AXIS_MAX;
    };
    let scaled = u64::from(leader) * 13 / 10;
    let floored = scaled - scaled % 100;
    u32::try_from(floored).unwrap_or(u32::MAX).max(MIN_AXIS_MAX)
}

/// Rank every group of a snapshot, pairing each with its display caption.
pub fn rank_snapshot(snapshot: &VoteSnapshot, captions: &[String], n: usize) -> Vec<RankedGroup> {
    snapshot
        .groups()
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let entries = top_n(&group.records, n);
            RankedGroup {
                caption: captions.get(i).cloned().unwrap_or_else(|| group.marker.clone()),
                axis_max: axis_max(&entries),
                entries,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VoteGroup;
    use chrono::DateTime;

    #[test]
    fn axis_floors_to_hundreds() {
        // 777 * 1.3 = 1010.1 -> 1000
        assert_eq!(axis_max(&[VoteRecord::new("a", 777)]), 1000);
        // 100 * 1.3 = 130 -> 100 -> raised to the floor of 200
        assert_eq!(axis_max(&[VoteRecord::new("a", 100)]), 200);
        assert_eq!(axis_max(&[]), 200);
    }

    #[test]
    fn tick_step_widens_for_large_axes() {
        let small = RankedGroup { caption: "s".into(), entries: vec![], axis_max: 900 };
        let large = RankedGroup { caption: "l".into(), entries: vec![], axis_max: 1000 };
        assert_eq!(small.tick_step(), 100);
        assert_eq!(large.tick_step(), 200);
    }

    #[test]
    fn ranks_each_group_with_caption_fallback() {
        let at = DateTime::parse_from_rfc3339("2025-10-01T08:00:00+09:00").unwrap();
        let snapshot = VoteSnapshot::new(
            vec![
                VoteGroup {
                    marker: "Alpha".into(),
                    records: vec![VoteRecord::new("Ep1", 3), VoteRecord::new("Ep2", 10)],
                },
                VoteGroup { marker: "Beta".into(), records: vec![] },
            ],
            at,
        );
        let ranked = rank_snapshot(&snapshot, &["Season one".to_string()], 1);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].caption, "Season one");
        assert_eq!(ranked[0].entries, vec![VoteRecord::new("Ep2", 10)]);
        assert_eq!(ranked[1].caption, "Beta");
        assert!(ranked[1].entries.is_empty());
        assert_eq!(ranked[1].axis_max, 200);
    }
}
