//! JSON-file backend: one pretty-printed file per key in a directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::store::CheckpointBackend;
use super::types::Checkpoint;

#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default directory: `~/.local/state/ndl/checkpoints/`.
    pub fn default_dir() -> Result<PathBuf> {
        Ok(crate::config::state_dir()?.join("checkpoints"))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("create dir: {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("temp file in {}", dir.display()))?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("write checkpoint: {}", path.display()))?;
    Ok(())
}

fn read_checkpoint(path: &Path) -> Result<Option<Checkpoint>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read checkpoint: {}", path.display())),
    };
    let cp = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse checkpoint: {}", path.display()))?;
    Ok(Some(cp))
}

#[async_trait]
impl CheckpointBackend for JsonFileBackend {
    async fn put(&self, key: &str, checkpoint: &Checkpoint) -> Result<()> {
        let json = serde_json::to_vec_pretty(checkpoint).context("serialize checkpoint")?;
        let dir = self.dir.clone();
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &json))
            .await
            .context("checkpoint write task join")?
    }

    async fn get(&self, key: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || read_checkpoint(&path))
            .await
            .context("checkpoint read task join")?
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove checkpoint: {}", path.display())),
        }
    }

    /// Newest first; unreadable files are logged and skipped.
    async fn list(&self) -> Result<Vec<Checkpoint>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("list {}", self.dir.display())),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Checkpoint>(&bytes) {
                Ok(cp) => out.push(cp),
                Err(e) => tracing::warn!(path = %path.display(), "skipping unreadable checkpoint: {}", e),
            }
        }
        out.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(out)
    }
}
