//! SQLite-backed checkpoint table (sqlx).
//!
//! The database file lives under the XDG state directory:
//! `~/.local/state/ndl/checkpoints.db`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::collections::BTreeSet;
use std::path::Path;

use super::store::CheckpointBackend;
use super::types::Checkpoint;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

#[derive(Clone)]
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
}

impl SqliteBackend {
    /// Open (or create) the default checkpoint database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let db_path = crate::config::state_dir()?.join("checkpoints.db");
        Self::open_at(&db_path).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await
            .with_context(|| format!("open checkpoint db: {}", path.display()))?;
        let db = SqliteBackend { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database (single connection so the pool never hands back a fresh empty DB).
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = SqliteBackend { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // One row per sanitized title. `done_indexes` is a JSON array of item indices.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                key TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                range_start INTEGER NOT NULL,
                range_end INTEGER NOT NULL,
                completed_count INTEGER NOT NULL,
                failed_count INTEGER NOT NULL,
                challenge_count INTEGER NOT NULL,
                done_indexes TEXT NOT NULL,
                saved_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_checkpoint(row: &sqlx::sqlite::SqliteRow) -> Result<Checkpoint> {
    let done_json: String = row.get("done_indexes");
    let done_indexes: BTreeSet<usize> =
        serde_json::from_str(&done_json).context("parse done_indexes")?;
    let as_usize = |col: &str| -> Result<usize> {
        let v: i64 = row.get(col);
        usize::try_from(v).with_context(|| format!("negative {}", col))
    };
    Ok(Checkpoint {
        title: row.get("title"),
        range_start: as_usize("range_start")?,
        range_end: as_usize("range_end")?,
        completed_count: as_usize("completed_count")?,
        failed_count: as_usize("failed_count")?,
        challenge_count: as_usize("challenge_count")?,
        done_indexes,
        saved_at: row.get("saved_at"),
    })
}

#[async_trait]
impl CheckpointBackend for SqliteBackend {
    async fn put(&self, key: &str, checkpoint: &Checkpoint) -> Result<()> {
        let done_json = serde_json::to_string(&checkpoint.done_indexes)?;
        sqlx::query(
            r#"
            INSERT INTO checkpoints (
                key, title, range_start, range_end,
                completed_count, failed_count, challenge_count,
                done_indexes, saved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(key) DO UPDATE SET
                title = excluded.title,
                range_start = excluded.range_start,
                range_end = excluded.range_end,
                completed_count = excluded.completed_count,
                failed_count = excluded.failed_count,
                challenge_count = excluded.challenge_count,
                done_indexes = excluded.done_indexes,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(key)
        .bind(&checkpoint.title)
        .bind(checkpoint.range_start as i64)
        .bind(checkpoint.range_end as i64)
        .bind(checkpoint.completed_count as i64)
        .bind(checkpoint.failed_count as i64)
        .bind(checkpoint.challenge_count as i64)
        .bind(done_json)
        .bind(checkpoint.saved_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            r#"
            SELECT title, range_start, range_end, completed_count, failed_count,
                   challenge_count, done_indexes, saved_at
            FROM checkpoints
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_checkpoint).transpose()
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM checkpoints
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest first.
    async fn list(&self) -> Result<Vec<Checkpoint>> {
        let rows = sqlx::query(
            r#"
            SELECT title, range_start, range_end, completed_count, failed_count,
                   challenge_count, done_indexes, saved_at
            FROM checkpoints
            ORDER BY saved_at DESC, key ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_checkpoint).collect()
    }
}
