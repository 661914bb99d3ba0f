//! Progress tracking for a job: percent done, elapsed time, and an adaptive ETA.
//!
//! The ETA is a moving average over the most recent per-item durations, so a
//! long stall (human-assisted challenge, pause) stops affecting the estimate
//! once a few fresh items have completed. The window is not persisted; after a
//! resume the estimate starts cold.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default number of samples in the moving-average window.
pub const DEFAULT_WINDOW: usize = 5;

/// Snapshot returned by [`ProgressTracker::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    /// Completion in percent, in `[0.0, 100.0]`.
    pub percent: f64,
    /// Time since the tracker was created.
    pub elapsed: Duration,
    /// Estimated time left; `None` until at least one item has been timed.
    pub estimated_remaining: Option<Duration>,
    /// Recent throughput (items per second); 0 when unknown.
    pub items_per_sec: f64,
}

/// Moving-average progress tracker for `total` items.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: usize,
    window: usize,
    started: Instant,
    last_at: Instant,
    last_completed: usize,
    samples: VecDeque<Duration>,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self::with_window(total, 0, DEFAULT_WINDOW)
    }

    /// Tracker for a resumed job: `already_done` items are counted toward the
    /// percentage but not timed.
    pub fn resumed(total: usize, already_done: usize) -> Self {
        Self::with_window(total, already_done, DEFAULT_WINDOW)
    }

    pub fn with_window(total: usize, already_done: usize, window: usize) -> Self {
        let now = Instant::now();
        Self {
            total,
            window: window.max(1),
            started: now,
            last_at: now,
            last_completed: already_done.min(total),
            samples: VecDeque::with_capacity(window.max(1)),
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Record that `completed` items are now done (cumulative, including items
    /// from a previous session) and return fresh statistics.
    pub fn update(&mut self, completed: usize) -> ProgressStats {
        self.update_at(completed, Instant::now())
    }

    /// Like [`update`](Self::update) with an explicit clock reading.
    pub fn update_at(&mut self, completed: usize, now: Instant) -> ProgressStats {
        let completed = completed.min(self.total);
        if completed > self.last_completed {
            let items = (completed - self.last_completed) as u32;
            let per_item = now.saturating_duration_since(self.last_at) / items;
            self.samples.push_back(per_item);
            while self.samples.len() > self.window {
                self.samples.pop_front();
            }
            self.last_completed = completed;
            self.last_at = now;
        }

        let percent = if self.total == 0 {
            100.0
        } else {
            completed as f64 / self.total as f64 * 100.0
        };

        let average = self.average();
        let remaining_items = (self.total - completed) as u32;
        let estimated_remaining = average.map(|avg| avg * remaining_items);
        let items_per_sec = match average {
            Some(avg) if avg > Duration::ZERO => 1.0 / avg.as_secs_f64(),
            _ => 0.0,
        };

        ProgressStats {
            percent,
            elapsed: now.saturating_duration_since(self.started),
            estimated_remaining,
            items_per_sec,
        }
    }

    /// Restart the current sample interval without recording one. Used after a
    /// pause so the paused time is not attributed to the next item.
    pub fn reset_interval(&mut self) {
        self.last_at = Instant::now();
    }

    fn average(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: Duration = self.samples.iter().sum();
        Some(sum / self.samples.len() as u32)
    }
}

/// Human-readable duration: `42s` under a minute (rounded up), `3m 5s` under
/// an hour, `2h 10m` otherwise.
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 60_000 {
        return format!("{}s", ms.div_ceil(1000));
    }
    if ms < 3_600_000 {
        return format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000);
    }
    format!("{}h {}m", ms / 3_600_000, (ms % 3_600_000) / 60_000)
}
