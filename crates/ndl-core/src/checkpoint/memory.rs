//! In-process backend (tests, or when no durable backend can be opened).

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::store::CheckpointBackend;
use super::types::Checkpoint;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointBackend for MemoryBackend {
    async fn put(&self, key: &str, checkpoint: &Checkpoint) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("checkpoint map poisoned"))?
            .insert(key.to_string(), checkpoint.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Checkpoint>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| anyhow!("checkpoint map poisoned"))?
            .get(key)
            .cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("checkpoint map poisoned"))?
            .remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Checkpoint>> {
        let mut all: Vec<Checkpoint> = self
            .entries
            .lock()
            .map_err(|_| anyhow!("checkpoint map poisoned"))?
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(all)
    }
}
