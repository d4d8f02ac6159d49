use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub title: String,
    pub count: u32,
}

impl VoteRecord {
    pub fn new(title: impl Into<String>, count: u32) -> Self {
        Self {
            title: title.into(),
            count,
        }
    }
}

// One competing group, keyed by the marker that opens its section on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteGroup {
    pub marker: String,
    pub records: Vec<VoteRecord>,
}

/// One parsed capture of the voting page. Never mutated after parsing; a new
/// scrape always produces a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSnapshot {
    groups: Vec<VoteGroup>,
    captured_at: DateTime<FixedOffset>,
}

impl VoteSnapshot {
    pub fn new(groups: Vec<VoteGroup>, captured_at: DateTime<FixedOffset>) -> Self {
        Self { groups, captured_at }
    }

    pub fn groups(&self) -> &[VoteGroup] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> &[VoteRecord] {
        self.groups
            .get(index)
            .map(|group| group.records.as_slice())
            .unwrap_or(&[])
    }

    pub fn captured_at(&self) -> DateTime<FixedOffset> {
        self.captured_at
    }

    pub fn total_records(&self) -> usize {
        self.groups.iter().map(|group| group.records.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorMode {
    Normal,
    Final,
}

// Checkpoint label for routine runs (RUN_LABEL=AM / PM / unset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunLabel {
    FirstCheckpoint,
    SecondCheckpoint,
    Unset,
}

impl RunLabel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AM" => Some(RunLabel::FirstCheckpoint),
            "PM" => Some(RunLabel::SecondCheckpoint),
            "" => Some(RunLabel::Unset),
            _ => None,
        }
    }

    // Wall-clock hour of the checkpoint, in campaign local time
    pub fn checkpoint_hour(&self) -> Option<u32> {
        match self {
            RunLabel::FirstCheckpoint => Some(8),
            RunLabel::SecondCheckpoint => Some(20),
            RunLabel::Unset => None,
        }
    }

    pub fn file_tag(&self) -> &'static str {
        match self {
            RunLabel::FirstCheckpoint => "AM",
            RunLabel::SecondCheckpoint => "PM",
            RunLabel::Unset => "RUN",
        }
    }
}

/// The instant a run's announcement claims to represent. Built once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorSpec {
    pub target_instant: DateTime<FixedOffset>,
    pub mode: AnchorMode,
    pub run_label: RunLabel,
    pub pre_snapshot_lead_seconds: i64,
}

impl AnchorSpec {
    pub fn is_final(&self) -> bool {
        self.mode == AnchorMode::Final
    }

    // Whether the run should hold the announcement until the anchor
    pub fn waits_for_anchor(&self) -> bool {
        self.is_final() || self.run_label != RunLabel::Unset
    }

    pub fn file_tag(&self) -> &'static str {
        if self.is_final() {
            "FINAL"
        } else {
            self.run_label.file_tag()
        }
    }
}
