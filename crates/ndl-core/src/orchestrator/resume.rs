//! Deciding whether a job starts fresh or from a stored checkpoint.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::interaction::Interaction;

use super::job::Job;

/// Outcome of [`resolve_checkpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeDecision {
    /// No checkpoint was stored.
    Fresh,
    /// The user chose to resume; the job's range now matches the checkpoint.
    Resumed(Checkpoint),
    /// A checkpoint existed but the user chose to start over; it has been
    /// cleared and any staged output should be discarded too.
    Discarded,
}

impl ResumeDecision {
    pub fn into_checkpoint(self) -> Option<Checkpoint> {
        match self {
            ResumeDecision::Resumed(cp) => Some(cp),
            ResumeDecision::Fresh | ResumeDecision::Discarded => None,
        }
    }
}

/// Load the checkpoint for `job.title` and ask whether to resume it.
///
/// On resume the checkpoint's range replaces the job's (a resumed job
/// finishes the range it started). A checkpoint whose range no longer fits
/// the item list is discarded.
pub async fn resolve_checkpoint(
    store: &CheckpointStore,
    interaction: &dyn Interaction,
    job: &mut Job,
) -> ResumeDecision {
    let Some(cp) = store.load(&job.title).await else {
        return ResumeDecision::Fresh;
    };

    let len = job.item_refs.len();
    if cp.range_start < 1 || cp.range_start > cp.range_end || cp.range_end > len {
        tracing::warn!(
            start = cp.range_start,
            end = cp.range_end,
            len,
            "stored checkpoint range does not fit the item list; starting over"
        );
        store.clear(&job.title).await;
        return ResumeDecision::Discarded;
    }

    if interaction.confirm_resume(&cp.summary()).await {
        tracing::info!(
            title = %job.title,
            completed = cp.completed_count,
            start = cp.range_start,
            end = cp.range_end,
            "resuming from checkpoint"
        );
        job.range_start = cp.range_start;
        job.range_end = cp.range_end;
        ResumeDecision::Resumed(cp)
    } else {
        tracing::info!(title = %job.title, "checkpoint ignored, starting over");
        store.clear(&job.title).await;
        ResumeDecision::Discarded
    }
}
