//! Human interaction surface: progress sink plus yes/no decisions.
//!
//! Confirmations are async: the orchestrator awaits the answer inside the
//! current item's sub-cycle, so a slow human only stalls that item.

use async_trait::async_trait;

use crate::checkpoint::CheckpointSummary;
use crate::orchestrator::RunPhase;
use crate::progress::ProgressStats;

/// One progress update.
#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub status_text: String,
    pub phase: RunPhase,
    pub completed: usize,
    pub failed: usize,
    pub challenges: usize,
    /// Items in the job's range.
    pub total: usize,
    /// Set after each completed item.
    pub stats: Option<ProgressStats>,
}

#[async_trait]
pub trait Interaction: Send + Sync {
    fn report_progress(&self, report: &ProgressReport);

    /// A probable challenge blocked `item_ref`. `true` = "resolved, retry once",
    /// `false` = "give up on this item".
    async fn confirm_challenge(&self, item_ref: &str) -> bool;

    /// A checkpoint exists for this job. `true` = resume it, `false` = start over.
    async fn confirm_resume(&self, summary: &CheckpointSummary) -> bool;
}

/// Unattended answers; progress goes to the log.
#[derive(Debug, Clone, Copy)]
pub struct AutoInteraction {
    pub resume: bool,
    pub retry_challenges: bool,
}

impl Default for AutoInteraction {
    fn default() -> Self {
        Self {
            resume: true,
            retry_challenges: false,
        }
    }
}

#[async_trait]
impl Interaction for AutoInteraction {
    fn report_progress(&self, report: &ProgressReport) {
        tracing::info!(
            completed = report.completed,
            failed = report.failed,
            challenges = report.challenges,
            total = report.total,
            "{}",
            report.status_text
        );
    }

    async fn confirm_challenge(&self, item_ref: &str) -> bool {
        tracing::warn!(item = item_ref, retry = self.retry_challenges, "challenge detected (unattended)");
        self.retry_challenges
    }

    async fn confirm_resume(&self, summary: &CheckpointSummary) -> bool {
        tracing::info!(
            title = %summary.title,
            completed = summary.completed_count,
            resume = self.resume,
            "checkpoint found (unattended)"
        );
        self.resume
    }
}
