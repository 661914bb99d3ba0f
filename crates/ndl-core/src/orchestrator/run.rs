//! The orchestrator loop: fetch, extract, store, one item at a time.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;

use super::job::{Job, JobError};
use super::state::{JobState, RunPhase};
use crate::archive::ArchiveWriter;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::control::{Command, ControlSignal, JobAborted};
use crate::extract::{Extracted, Extractor};
use crate::fetch::{FetchError, Fetcher};
use crate::interaction::{Interaction, ProgressReport};
use crate::policy::{ChallengePolicy, FetchOutcome, ItemError, Verdict};
use crate::progress::{ProgressStats, ProgressTracker, DEFAULT_WINDOW};

/// Completed items between periodic checkpoint saves.
pub const DEFAULT_CHECKPOINT_EVERY: usize = 5;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every item in the range was attempted; the checkpoint was cleared.
    Completed,
    /// The user aborted; the checkpoint was saved for a later resume.
    Aborted,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: Outcome,
    pub completed: usize,
    pub failed: usize,
    pub challenges: usize,
    pub total: usize,
    /// Record names stored during this run, in order.
    pub records: Vec<String>,
    pub done_indexes: BTreeSet<usize>,
}

/// Why one attempt at an item produced nothing.
enum Miss {
    NoContent,
    Fetch(FetchError),
}

impl Miss {
    fn outcome(&self) -> FetchOutcome<'_> {
        match self {
            Miss::NoContent => FetchOutcome::NoContent,
            Miss::Fetch(e) => FetchOutcome::Failed(e),
        }
    }

    fn into_item_error(self, item: &str) -> ItemError {
        match self {
            Miss::NoContent => ItemError::TransientChallenge { item: item.to_string() },
            Miss::Fetch(source) => ItemError::FetchError {
                item: item.to_string(),
                source,
            },
        }
    }
}

/// Minimum idle time between the end of one item and the next fetch.
struct Throttle {
    delay: Duration,
    last_finish: Option<Instant>,
}

impl Throttle {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_finish: None,
        }
    }

    /// Earliest instant the next fetch may start; `None` before the first item.
    fn next_slot(&self) -> Option<Instant> {
        self.last_finish.map(|t| t + self.delay)
    }

    /// Record that an item (or one attempt at it) has just finished.
    fn finished(&mut self) {
        self.last_finish = Some(Instant::now());
    }
}

/// Drives one job at a time through its collaborators.
pub struct Orchestrator<'a> {
    fetcher: &'a dyn Fetcher,
    extractor: &'a dyn Extractor,
    store: &'a CheckpointStore,
    interaction: &'a dyn Interaction,
    control: ControlSignal,
    fetch_errors_are_challenges: bool,
    checkpoint_every: usize,
    progress_window: usize,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        extractor: &'a dyn Extractor,
        store: &'a CheckpointStore,
        interaction: &'a dyn Interaction,
        control: ControlSignal,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            interaction,
            control,
            fetch_errors_are_challenges: true,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            progress_window: DEFAULT_WINDOW,
        }
    }

    /// Save a checkpoint after every `k` completed items (minimum 1).
    pub fn checkpoint_every(mut self, k: usize) -> Self {
        self.checkpoint_every = k.max(1);
        self
    }

    pub fn progress_window(mut self, samples: usize) -> Self {
        self.progress_window = samples.max(1);
        self
    }

    /// When false, only HTTP 403/429/503 failures are treated as challenges.
    pub fn fetch_errors_are_challenges(mut self, yes: bool) -> Self {
        self.fetch_errors_are_challenges = yes;
        self
    }

    /// Run `job` to completion or abort.
    ///
    /// With `checkpoint`, items in its done set are skipped without fetching.
    /// Per-item failures never end the run; only an invalid job does.
    pub async fn run(
        &mut self,
        job: &Job,
        checkpoint: Option<Checkpoint>,
        archive: &mut dyn ArchiveWriter,
    ) -> Result<RunReport, JobError> {
        job.validate()?;

        let resuming = checkpoint.is_some();
        let mut state = match checkpoint {
            Some(cp) => JobState::resumed(job, cp),
            None => JobState::fresh(job),
        };
        let policy = ChallengePolicy::new(job.source.clone())
            .with_fetch_errors_as_challenges(self.fetch_errors_are_challenges);
        let total = job.total();
        let mut tracker = ProgressTracker::with_window(total, state.completed, self.progress_window);
        let mut throttle = Throttle::new(job.delay);
        let mut records = Vec::new();

        state.phase = RunPhase::Running;
        tracing::info!(
            title = %job.title,
            start = job.range_start,
            end = job.range_end,
            already_done = state.completed,
            delay_ms = job.delay.as_millis() as u64,
            "job started"
        );
        let opening = if resuming {
            format!("Resuming: {}/{} already done", state.completed, total)
        } else {
            "Preparing download...".to_string()
        };
        self.report(&state, total, opening, None);

        for (number, index) in job.traversal() {
            if self.honor_pause(&mut state, job, total, &mut tracker).await.is_err() {
                return Ok(self.finish_aborted(state, job, total, records).await);
            }
            if state.done.contains(&index) {
                tracing::trace!(number, index, "already done, skipping");
                continue;
            }
            let item_ref = job.item_refs[index].as_str();
            let position = number + 1 - job.range_start;

            if self.wait_for_slot(&throttle, &mut state, job, total, &mut tracker).await.is_err() {
                return Ok(self.finish_aborted(state, job, total, records).await);
            }

            // Never touch a reference outside the expected source.
            if let Verdict::Skip(reason) = policy.classify(item_ref, FetchOutcome::Extracted) {
                throttle.finished();
                state.failed += 1;
                let err = ItemError::StructuralMismatch { item: item_ref.to_string() };
                tracing::warn!(number, reason = reason.as_str(), "{}", err);
                self.report(&state, total, format!("Skipped #{}: unexpected source", number), None);
                continue;
            }

            state.phase = RunPhase::Fetching;
            self.report(
                &state,
                total,
                format!("Downloading #{}... ({}/{})", number, position, total),
                None,
            );
            let first = match self.attempt(item_ref).await {
                Ok(r) => r,
                Err(JobAborted) => return Ok(self.finish_aborted(state, job, total, records).await),
            };
            throttle.finished();

            let extracted = match first {
                Ok(extracted) => Some(extracted),
                Err(miss) => match policy.classify(item_ref, miss.outcome()) {
                    Verdict::Challenge => {
                        state.challenges += 1;
                        tracing::warn!(number, "{}", miss.into_item_error(item_ref));
                        let retried = self
                            .challenge(number, item_ref, &mut throttle, &mut state, job, total, &mut tracker)
                            .await;
                        match retried {
                            Ok(r) => r,
                            Err(JobAborted) => {
                                return Ok(self.finish_aborted(state, job, total, records).await)
                            }
                        }
                    }
                    Verdict::Skip(reason) => {
                        tracing::warn!(number, reason = reason.as_str(), "{}", miss.into_item_error(item_ref));
                        None
                    }
                    // A miss never classifies as Proceed.
                    Verdict::Proceed => None,
                },
            };
            state.phase = RunPhase::Running;

            let Some(extracted) = extracted else {
                throttle.finished();
                state.failed += 1;
                self.report(&state, total, format!("Failed #{}", number), None);
                continue;
            };

            let name = self.extractor.record_name(number, job.item_refs.len(), item_ref);
            let stored = archive.add_record(&name, &extracted.body);
            throttle.finished();
            if let Err(e) = stored {
                state.failed += 1;
                tracing::warn!(number, record = %name, "could not store record: {:#}", e);
                self.report(&state, total, format!("Failed #{}: could not store", number), None);
                continue;
            }

            state.done.insert(index);
            state.completed += 1;
            records.push(name);
            let stats = tracker.update(state.completed);
            tracing::debug!(number, completed = state.completed, "item stored");
            if state.completed % self.checkpoint_every == 0 {
                self.store.save(&job.title, &state.to_checkpoint()).await;
            }
            self.report(
                &state,
                total,
                format!("Downloaded #{} ({}/{})", number, position, total),
                Some(stats),
            );
        }

        state.phase = RunPhase::Completed;
        self.store.clear(&job.title).await;
        tracing::info!(
            title = %job.title,
            completed = state.completed,
            failed = state.failed,
            challenges = state.challenges,
            "job completed"
        );
        self.report(&state, total, "Download complete".to_string(), None);
        Ok(into_report(state, Outcome::Completed, total, records))
    }

    /// Challenge sub-cycle: ask a human, then retry the item exactly once.
    #[allow(clippy::too_many_arguments)]
    async fn challenge(
        &mut self,
        number: usize,
        item_ref: &str,
        throttle: &mut Throttle,
        state: &mut JobState,
        job: &Job,
        total: usize,
        tracker: &mut ProgressTracker,
    ) -> Result<Option<Extracted>, JobAborted> {
        state.phase = RunPhase::AwaitingHuman;
        self.report(
            state,
            total,
            format!("Challenge at #{}: waiting for confirmation", number),
            None,
        );
        if !self.confirm_challenge(item_ref).await? {
            tracing::info!(number, "challenge declined, skipping item");
            return Ok(None);
        }

        self.wait_for_slot(throttle, state, job, total, tracker).await?;
        state.phase = RunPhase::Retrying;
        self.report(state, total, format!("Retrying #{}...", number), None);
        match self.attempt(item_ref).await? {
            Ok(extracted) => Ok(Some(extracted)),
            Err(miss) => {
                tracing::warn!(number, "retry failed: {}", miss.into_item_error(item_ref));
                Ok(None)
            }
        }
    }

    /// One fetch+extract. `Err` only on abort.
    async fn attempt(&mut self, item_ref: &str) -> Result<Result<Extracted, Miss>, JobAborted> {
        let fetcher = self.fetcher;
        let fetched = tokio::select! {
            biased;
            _ = self.control.aborted() => return Err(JobAborted),
            r = fetcher.fetch(item_ref) => r,
        };
        Ok(match fetched {
            Ok(doc) => self.extractor.extract(&doc).ok_or(Miss::NoContent),
            Err(e) => Err(Miss::Fetch(e)),
        })
    }

    async fn confirm_challenge(&mut self, item_ref: &str) -> Result<bool, JobAborted> {
        let interaction = self.interaction;
        tokio::select! {
            biased;
            _ = self.control.aborted() => Err(JobAborted),
            c = interaction.confirm_challenge(item_ref) => Ok(c),
        }
    }

    /// Act on a pending pause or abort at an item boundary.
    async fn honor_pause(
        &mut self,
        state: &mut JobState,
        job: &Job,
        total: usize,
        tracker: &mut ProgressTracker,
    ) -> Result<(), JobAborted> {
        match self.control.current() {
            Command::Run => Ok(()),
            Command::Abort => Err(JobAborted),
            Command::Pause => self.paused(state, job, total, tracker).await,
        }
    }

    /// Sleep until `delay` has passed since the last item finished. A pause
    /// during the wait is honored immediately and the deadline does not move.
    async fn wait_for_slot(
        &mut self,
        throttle: &Throttle,
        state: &mut JobState,
        job: &Job,
        total: usize,
        tracker: &mut ProgressTracker,
    ) -> Result<(), JobAborted> {
        let Some(slot) = throttle.next_slot() else {
            return Ok(());
        };
        loop {
            self.honor_pause(state, job, total, tracker).await?;
            let cmd = tokio::select! {
                _ = tokio::time::sleep_until(slot) => return Ok(()),
                cmd = self.control.changed() => cmd,
            };
            match cmd {
                Command::Abort => return Err(JobAborted),
                Command::Pause => self.paused(state, job, total, tracker).await?,
                Command::Run => {}
            }
        }
    }

    async fn paused(
        &mut self,
        state: &mut JobState,
        job: &Job,
        total: usize,
        tracker: &mut ProgressTracker,
    ) -> Result<(), JobAborted> {
        state.phase = RunPhase::Paused;
        self.store.save(&job.title, &state.to_checkpoint()).await;
        tracing::info!(title = %job.title, completed = state.completed, "paused");
        self.report(state, total, "Paused".to_string(), None);

        self.control.wait_while_paused().await?;

        tracker.reset_interval();
        state.phase = RunPhase::Running;
        tracing::info!(title = %job.title, "resumed");
        self.report(state, total, "Resuming download...".to_string(), None);
        Ok(())
    }

    async fn finish_aborted(
        &mut self,
        mut state: JobState,
        job: &Job,
        total: usize,
        records: Vec<String>,
    ) -> RunReport {
        state.phase = RunPhase::Aborted;
        self.store.save(&job.title, &state.to_checkpoint()).await;
        tracing::info!(
            title = %job.title,
            completed = state.completed,
            failed = state.failed,
            "job aborted; checkpoint kept"
        );
        self.report(&state, total, "Aborted".to_string(), None);
        into_report(state, Outcome::Aborted, total, records)
    }

    fn report(&self, state: &JobState, total: usize, status_text: String, stats: Option<ProgressStats>) {
        self.interaction.report_progress(&ProgressReport {
            status_text,
            phase: state.phase,
            completed: state.completed,
            failed: state.failed,
            challenges: state.challenges,
            total,
            stats,
        });
    }
}

fn into_report(state: JobState, outcome: Outcome, total: usize, records: Vec<String>) -> RunReport {
    RunReport {
        outcome,
        completed: state.completed,
        failed: state.failed,
        challenges: state.challenges,
        total,
        records,
        done_indexes: state.done,
    }
}
