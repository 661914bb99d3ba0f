//! Backend trait and the best-effort store wrapper used by the orchestrator.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::types::{unix_millis, Checkpoint};
use crate::naming::checkpoint_key;
use crate::policy::ItemError;

/// Storage backend. Keys are already sanitized (see [`checkpoint_key`]).
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    async fn put(&self, key: &str, checkpoint: &Checkpoint) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Checkpoint>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn list(&self) -> Result<Vec<Checkpoint>>;
}

/// Best-effort checkpoint store over any backend.
#[derive(Clone)]
pub struct CheckpointStore {
    backend: Arc<dyn CheckpointBackend>,
}

impl CheckpointStore {
    pub fn new(backend: Arc<dyn CheckpointBackend>) -> Self {
        Self { backend }
    }

    /// Store that only lives in this process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(super::MemoryBackend::new()))
    }

    /// Persist `checkpoint` under `title`, stamping `saved_at`. Returns false on failure.
    pub async fn save(&self, title: &str, checkpoint: &Checkpoint) -> bool {
        let key = checkpoint_key(title);
        let mut stamped = checkpoint.clone();
        stamped.saved_at = unix_millis();
        match self.backend.put(&key, &stamped).await {
            Ok(()) => {
                tracing::debug!(
                    key = %key,
                    completed = stamped.completed_count,
                    done = stamped.done_indexes.len(),
                    "checkpoint saved"
                );
                true
            }
            Err(e) => {
                log_failure("save", &key, &e);
                false
            }
        }
    }

    /// Load the checkpoint for `title`, if one exists and is readable.
    pub async fn load(&self, title: &str) -> Option<Checkpoint> {
        let key = checkpoint_key(title);
        match self.backend.get(&key).await {
            Ok(found) => {
                if found.is_none() {
                    tracing::debug!(key = %key, "no checkpoint");
                }
                found
            }
            Err(e) => {
                log_failure("load", &key, &e);
                None
            }
        }
    }

    /// Erase the checkpoint for `title`. Erasing a missing checkpoint succeeds.
    pub async fn clear(&self, title: &str) -> bool {
        let key = checkpoint_key(title);
        match self.backend.delete(&key).await {
            Ok(()) => {
                tracing::debug!(key = %key, "checkpoint cleared");
                true
            }
            Err(e) => {
                log_failure("clear", &key, &e);
                false
            }
        }
    }

    /// All stored checkpoints (empty on failure).
    pub async fn list(&self) -> Vec<Checkpoint> {
        match self.backend.list().await {
            Ok(all) => all,
            Err(e) => {
                log_failure("list", "*", &e);
                Vec::new()
            }
        }
    }
}

fn log_failure(op: &'static str, key: &str, e: &anyhow::Error) {
    let err = ItemError::PersistenceError {
        op,
        key: key.to_string(),
        reason: format!("{:#}", e),
    };
    tracing::warn!("{}; continuing without durable progress", err);
}
