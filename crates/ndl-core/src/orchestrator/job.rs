//! Job definition and range/traversal rules.

use std::time::Duration;

use crate::policy::SourcePattern;

/// How user-facing item numbers map to positions in `item_refs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Numbering {
    /// Item 1 is `item_refs[0]` (galleries, oldest-first lists).
    #[default]
    OldestFirst,
    /// Item 1 is the last entry (episode lists that show the newest episode first).
    NewestFirst,
}

impl Numbering {
    /// Index in an item list of length `len` for 1-based `number`.
    /// Callers guarantee `1 <= number <= len`.
    pub fn index_of(self, number: usize, len: usize) -> usize {
        match self {
            Numbering::OldestFirst => number - 1,
            Numbering::NewestFirst => len - number,
        }
    }
}

/// Preconditions that stop a job before any fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("job has no items")]
    EmptySource,
    #[error("invalid range {start}..={end} for {len} items (need 1 <= start <= end <= {len})")]
    InvalidRange { start: usize, end: usize, len: usize },
}

/// One download run.
#[derive(Debug, Clone)]
pub struct Job {
    /// Checkpoint key and output file stem (sanitized where used).
    pub title: String,
    /// Immutable for the lifetime of the job.
    pub item_refs: Vec<String>,
    /// 1-based, inclusive.
    pub range_start: usize,
    /// 1-based, inclusive.
    pub range_end: usize,
    /// Minimum spacing between consecutive fetch starts.
    pub delay: Duration,
    pub numbering: Numbering,
    /// Expected origin of item references.
    pub source: SourcePattern,
}

impl Job {
    /// Job over the whole list with no delay, oldest-first numbering and any http(s) source.
    pub fn new(title: impl Into<String>, item_refs: Vec<String>) -> Self {
        let len = item_refs.len();
        Self {
            title: title.into(),
            item_refs,
            range_start: 1,
            range_end: len,
            delay: Duration::ZERO,
            numbering: Numbering::OldestFirst,
            source: SourcePattern::AnyHttp,
        }
    }

    pub fn with_range(mut self, start: usize, end: usize) -> Self {
        self.range_start = start;
        self.range_end = end;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_numbering(mut self, numbering: Numbering) -> Self {
        self.numbering = numbering;
        self
    }

    pub fn with_source(mut self, source: SourcePattern) -> Self {
        self.source = source;
        self
    }

    pub fn validate(&self) -> Result<(), JobError> {
        let len = self.item_refs.len();
        if len == 0 {
            return Err(JobError::EmptySource);
        }
        if self.range_start < 1 || self.range_start > self.range_end || self.range_end > len {
            return Err(JobError::InvalidRange {
                start: self.range_start,
                end: self.range_end,
                len,
            });
        }
        Ok(())
    }

    /// Items in the range. Only meaningful for a valid job.
    pub fn total(&self) -> usize {
        self.range_end + 1 - self.range_start
    }

    /// Fixed visiting order: `(number, index)` for numbers ascending over the range.
    /// `done_indexes` membership uses the same mapping.
    pub fn traversal(&self) -> Vec<(usize, usize)> {
        let len = self.item_refs.len();
        (self.range_start..=self.range_end)
            .map(|n| (n, self.numbering.index_of(n, len)))
            .collect()
    }

    /// True if `index` belongs to the range under this job's numbering.
    pub fn contains_index(&self, index: usize) -> bool {
        let len = self.item_refs.len();
        if index >= len {
            return false;
        }
        let number = match self.numbering {
            Numbering::OldestFirst => index + 1,
            Numbering::NewestFirst => len - index,
        };
        (self.range_start..=self.range_end).contains(&number)
    }
}
