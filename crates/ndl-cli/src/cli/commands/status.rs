//! `ndl status` – list saved checkpoints.

use anyhow::Result;
use ndl_core::checkpoint::{CheckpointStore, CheckpointSummary};
use ndl_core::progress::format_duration;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub async fn run_status(store: &CheckpointStore) -> Result<()> {
    let checkpoints = store.list().await;
    if checkpoints.is_empty() {
        println!("No saved checkpoints.");
        return Ok(());
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    println!("{:<12} {:<8} {:<8} {:<10} {}", "RANGE", "DONE", "FAILED", "SAVED", "TITLE");
    for cp in checkpoints {
        println!("{}", status_line(&cp.summary(), now));
    }
    Ok(())
}

pub(crate) fn status_line(s: &CheckpointSummary, now_millis: i64) -> String {
    let age = Duration::from_millis(now_millis.saturating_sub(s.saved_at).max(0) as u64);
    format!(
        "{:<12} {:<8} {:<8} {:<10} {}",
        format!("{}~{}", s.range_start, s.range_end),
        s.completed_count,
        s.failed_count,
        format!("{} ago", format_duration(age)),
        s.title
    )
}
