use crate::error::ParseError;
use crate::models::{VoteGroup, VoteRecord, VoteSnapshot};
use crate::voting::rank_order;
use chrono::{DateTime, FixedOffset};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    // 『title』 followed by up to six digits of vote count
    static ref VOTE_PAIR: Regex = Regex::new(r"『([^』]+)』\s*([0-9]{1,6})").expect("vote pair pattern");
}

/// Split flattened page text into groups and collect the title/count pairs of each.
///
/// Each marker opens a region that runs until the next marker found later in
/// the text (or the end of text). Pairs before the first found marker belong to
/// no group. Groups come back in marker order, each sorted by rank.
pub fn parse(
    text: &str,
    markers: &[String],
    captured_at: DateTime<FixedOffset>,
) -> Result<VoteSnapshot, ParseError> {
    let mut boundaries: Vec<(usize, usize)> = markers
        .iter()
        .enumerate()
        .filter_map(|(group, marker)| text.find(marker.as_str()).map(|pos| (pos, group)))
        .collect();
    boundaries.sort();

    let mut groups: Vec<VoteGroup> = markers
        .iter()
        .map(|marker| VoteGroup {
            marker: marker.clone(),
            records: Vec::new(),
        })
        .collect();

    for (i, &(start, group)) in boundaries.iter().enumerate() {
        let end = boundaries.get(i + 1).map_or(text.len(), |&(next, _)| next);
        groups[group].records.extend(extract_pairs(&text[start..end]));
    }

    for group in &mut groups {
        group.records = dedup_max(std::mem::take(&mut group.records));
    }

    if groups.iter().all(|group| group.records.is_empty()) {
        return Err(ParseError::NoVotes {
            markers: markers.to_vec(),
        });
    }

    Ok(VoteSnapshot::new(groups, captured_at))
}

fn extract_pairs(block: &str) -> impl Iterator<Item = VoteRecord> + '_ {
    VOTE_PAIR.captures_iter(block).filter_map(|caps| {
        let title = normalize_title(&caps[1]);
        if title.is_empty() {
            return None;
        }
        let count = caps[2].parse::<u32>().ok()?;
        Some(VoteRecord { title, count })
    })
}

// Collapse runs of whitespace (line breaks from flattening included) to one space
fn normalize_title(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn dedup_max(records: Vec<VoteRecord>) -> Vec<VoteRecord> {
    let mut best: HashMap<String, u32> = HashMap::new();
    for record in records {
        let slot = best.entry(record.title).or_insert(record.count);
        *slot = (*slot).max(record.count);
    }
    let mut out: Vec<VoteRecord> = best
        .into_iter()
        .map(|(title, count)| VoteRecord { title, count })
        .collect();
    out.sort_by(rank_order);
    out
}
