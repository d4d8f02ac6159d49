use crate::models::VoteRecord;
use std::cmp::Ordering;

// Descending by count, then ascending by title so ties never depend on input order
pub fn rank_order(a: &VoteRecord, b: &VoteRecord) -> Ordering {
    b.count.cmp(&a.count).then_with(|| a.title.cmp(&b.title))
}

/// Top `n` records by count, ties broken by title.
pub fn top_n(records: &[VoteRecord], n: usize) -> Vec<VoteRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(rank_order);
    sorted.truncate(n);
    sorted
}
