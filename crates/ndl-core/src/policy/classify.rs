//! Classify a fetch/extract outcome into a retry verdict.

use crate::fetch::FetchError;

use super::source::SourcePattern;

/// What happened when the orchestrator tried an item.
#[derive(Debug, Clone, Copy)]
pub enum FetchOutcome<'a> {
    /// Fetch succeeded and the extractor found content.
    Extracted,
    /// Fetch succeeded but the extractor found nothing.
    NoContent,
    /// The fetcher reported a failure.
    Failed(&'a FetchError),
}

/// Why an item is skipped without a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The reference is outside the expected source.
    PatternMismatch,
    /// Transport/HTTP failure a human cannot help with.
    FetchFailed,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::PatternMismatch => "pattern-mismatch",
            SkipReason::FetchFailed => "fetch-failed",
        }
    }
}

/// Decision returned by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep going with this item.
    Proceed,
    /// Probable challenge: ask a human, then retry once.
    Challenge,
    /// Record as failed, no retry.
    Skip(SkipReason),
}

/// Classify a fetch error on its own.
///
/// With `errors_are_challenges` every failure is treated like missing content.
/// Otherwise only statuses that typically front an interstitial or throttle
/// (403, 429, 503) still ask for a human; everything else is skipped.
pub fn classify_fetch_error(e: &FetchError, errors_are_challenges: bool) -> Verdict {
    if errors_are_challenges {
        return Verdict::Challenge;
    }
    match e {
        FetchError::Http(403 | 429 | 503) => Verdict::Challenge,
        FetchError::Http(_) | FetchError::Transport(_) | FetchError::Task(_) => {
            Verdict::Skip(SkipReason::FetchFailed)
        }
    }
}

/// Pure classification of one attempt at `item_ref`.
///
/// A reference outside `source` is a structural skip regardless of outcome, so
/// callers may classify with [`FetchOutcome::Extracted`] before fetching to
/// avoid hitting foreign origins at all.
pub fn classify(
    source: &SourcePattern,
    item_ref: &str,
    outcome: FetchOutcome<'_>,
    errors_are_challenges: bool,
) -> Verdict {
    if !source.matches(item_ref) {
        return Verdict::Skip(SkipReason::PatternMismatch);
    }
    match outcome {
        FetchOutcome::Extracted => Verdict::Proceed,
        FetchOutcome::NoContent => Verdict::Challenge,
        FetchOutcome::Failed(e) => classify_fetch_error(e, errors_are_challenges),
    }
}

/// Source pattern plus the fetch-error setting, bundled for the orchestrator.
#[derive(Debug, Clone)]
pub struct ChallengePolicy {
    pub source: SourcePattern,
    pub fetch_errors_are_challenges: bool,
}

impl ChallengePolicy {
    pub fn new(source: SourcePattern) -> Self {
        Self {
            source,
            fetch_errors_are_challenges: true,
        }
    }

    pub fn with_fetch_errors_as_challenges(mut self, yes: bool) -> Self {
        self.fetch_errors_are_challenges = yes;
        self
    }

    pub fn classify(&self, item_ref: &str, outcome: FetchOutcome<'_>) -> Verdict {
        classify(&self.source, item_ref, outcome, self.fetch_errors_are_challenges)
    }
}
