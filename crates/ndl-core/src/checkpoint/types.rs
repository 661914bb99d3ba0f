//! Persisted checkpoint record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot of a job's progress.
///
/// The field set is the compatibility contract for checkpoints written by
/// older versions; add fields only with `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub title: String,
    pub range_start: usize,
    pub range_end: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub challenge_count: usize,
    /// Item indices (into the job's item list) already stored.
    pub done_indexes: BTreeSet<usize>,
    /// Unix time in milliseconds.
    pub saved_at: i64,
}

impl Checkpoint {
    pub fn summary(&self) -> CheckpointSummary {
        CheckpointSummary {
            title: self.title.clone(),
            range_start: self.range_start,
            range_end: self.range_end,
            completed_count: self.completed_count,
            failed_count: self.failed_count,
            saved_at: self.saved_at,
        }
    }
}

/// What the user sees when asked whether to resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSummary {
    pub title: String,
    pub range_start: usize,
    pub range_end: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub saved_at: i64,
}

/// Current time as Unix milliseconds.
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
