//! Per-item failure taxonomy.

use crate::fetch::FetchError;

/// Why an item (or a checkpoint operation) failed. None of these abort a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    /// Probable challenge page: recoverable with human help, one retry.
    #[error("no content extracted from {item}; probable challenge")]
    TransientChallenge { item: String },
    /// Item reference outside the expected source; never retried.
    #[error("{item} does not match the expected source")]
    StructuralMismatch { item: String },
    /// Network or HTTP failure with no content.
    #[error("fetching {item} failed: {source}")]
    FetchError { item: String, source: FetchError },
    /// Checkpoint save/load/clear failed; degrades resumability only.
    #[error("checkpoint {op} failed for {key}: {reason}")]
    PersistenceError {
        op: &'static str,
        key: String,
        reason: String,
    },
}
