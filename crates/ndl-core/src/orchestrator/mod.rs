//! Download orchestrator: drives a job's range one item at a time.
//!
//! States: `Idle -> Running -> {Paused <-> Running} -> Completed`, or
//! `Aborted` when the caller cancels. Inside `Running` each item goes
//! `Fetching -> (success | AwaitingHuman -> {Retrying | skipped})`.
//!
//! The loop owns all job state ([`JobState`]); collaborators only see
//! read-only reports. Exactly one fetch is in flight at a time and
//! consecutive fetch starts are at least `Job::delay` apart.

mod job;
mod resume;
mod run;
mod state;

pub use job::{Job, JobError, Numbering};
pub use resume::{resolve_checkpoint, ResumeDecision};
pub use run::{Orchestrator, Outcome, RunReport, DEFAULT_CHECKPOINT_EVERY};
pub use state::{JobState, RunPhase};

#[cfg(test)]
mod tests;
