//! Mutable job state, owned by the orchestrator loop.

use std::collections::BTreeSet;

use super::job::Job;
use crate::checkpoint::Checkpoint;

/// Where the orchestrator is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Fetching,
    AwaitingHuman,
    Retrying,
    Paused,
    Completed,
    Aborted,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::Fetching => "fetching",
            RunPhase::AwaitingHuman => "awaiting-human",
            RunPhase::Retrying => "retrying",
            RunPhase::Paused => "paused",
            RunPhase::Completed => "completed",
            RunPhase::Aborted => "aborted",
        }
    }
}

/// Counters and done set for one run. Only the orchestrator mutates it.
#[derive(Debug, Clone)]
pub struct JobState {
    title: String,
    range_start: usize,
    range_end: usize,
    pub(super) completed: usize,
    pub(super) failed: usize,
    pub(super) challenges: usize,
    pub(super) done: BTreeSet<usize>,
    pub(super) phase: RunPhase,
}

impl JobState {
    pub(super) fn fresh(job: &Job) -> Self {
        Self {
            title: job.title.clone(),
            range_start: job.range_start,
            range_end: job.range_end,
            completed: 0,
            failed: 0,
            challenges: 0,
            done: BTreeSet::new(),
            phase: RunPhase::Idle,
        }
    }

    /// State restored from `cp`. Done indexes outside the job's range are
    /// dropped; `completed` is reconciled with the done set. Failed items are
    /// not in the done set and will be attempted again, so `failed` restarts
    /// at zero to keep `completed + failed <= total`. Challenges are a running
    /// tally and carry over.
    pub(super) fn resumed(job: &Job, cp: Checkpoint) -> Self {
        if cp.title != job.title {
            tracing::warn!(
                checkpoint = %cp.title,
                job = %job.title,
                "checkpoint belongs to a title with the same sanitized key"
            );
        }
        let before = cp.done_indexes.len();
        let done: BTreeSet<usize> = cp
            .done_indexes
            .into_iter()
            .filter(|i| job.contains_index(*i))
            .collect();
        if done.len() != before {
            tracing::warn!(
                dropped = before - done.len(),
                "checkpoint listed items outside the job range"
            );
        }
        if cp.completed_count != done.len() {
            tracing::debug!(
                stored = cp.completed_count,
                reconciled = done.len(),
                "completed count reconciled with done set"
            );
        }
        Self {
            title: job.title.clone(),
            range_start: job.range_start,
            range_end: job.range_end,
            completed: done.len(),
            failed: 0,
            challenges: cp.challenge_count,
            done,
            phase: RunPhase::Idle,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn challenges(&self) -> usize {
        self.challenges
    }

    pub fn done_indexes(&self) -> &BTreeSet<usize> {
        &self.done
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Snapshot for persistence (`saved_at` is stamped by the store).
    pub fn to_checkpoint(&self) -> Checkpoint {
        Checkpoint {
            title: self.title.clone(),
            range_start: self.range_start,
            range_end: self.range_end,
            completed_count: self.completed,
            failed_count: self.failed,
            challenge_count: self.challenges,
            done_indexes: self.done.clone(),
            saved_at: 0,
        }
    }
}
