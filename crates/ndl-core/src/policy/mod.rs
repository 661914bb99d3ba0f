//! Retry/challenge policy.
//!
//! Decides what a failed item costs: a probable anti-automation challenge gets
//! one human-assisted retry, a structural mismatch is skipped with no retry.
//! The system cannot see a CAPTCHA directly; "no content where content was
//! expected" is the signal.

mod classify;
mod error;
mod source;

pub use classify::{classify, classify_fetch_error, ChallengePolicy, FetchOutcome, SkipReason, Verdict};
pub use error::ItemError;
pub use source::SourcePattern;
