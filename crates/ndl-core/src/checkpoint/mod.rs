//! Checkpoint persistence keyed by job title.
//!
//! The orchestrator owns checkpoint contents; backends only store, fetch and
//! erase them by key. Every operation on [`CheckpointStore`] is best-effort:
//! failures are logged and reported as `false`/`None`, and the run carries on
//! in memory. A successful save guarantees that exact state is recoverable;
//! a failed one only costs resumability.

mod json;
mod memory;
mod sqlite;
mod store;
mod types;

pub use json::JsonFileBackend;
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use store::{CheckpointBackend, CheckpointStore};
pub use types::{Checkpoint, CheckpointSummary};
