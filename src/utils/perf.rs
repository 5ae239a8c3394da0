//! Turn latency measurement
//!
//! A [`Stopwatch`] runs for the lifetime of one turn and records a split at
//! each stage boundary. [`TimingTracker`] keeps a sliding window of the
//! response latency across turns.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks timing samples over a sliding window
#[derive(Debug)]
pub struct TimingTracker {
    samples: VecDeque<Duration>,
    max_samples: usize,
}

impl TimingTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(duration);
    }

    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.samples.iter().sum();
        total / self.samples.len() as u32
    }

    pub fn max(&self) -> Duration {
        self.samples.iter().max().copied().unwrap_or(Duration::ZERO)
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

/// A simple stopwatch for measuring elapsed time
#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
    splits: Vec<(String, Duration)>,
}

impl Stopwatch {
    /// Start a new stopwatch
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            splits: Vec::new(),
        }
    }

    /// Record a split time with a label
    pub fn split(&mut self, label: impl Into<String>) {
        self.splits.push((label.into(), self.start.elapsed()));
    }

    /// Elapsed time at the first split carrying `label`
    pub fn split_at(&self, label: &str) -> Option<Duration> {
        self.splits
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, at)| *at)
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn splits(&self) -> &[(String, Duration)] {
        &self.splits
    }

    pub fn into_splits(self) -> Vec<(String, Duration)> {
        self.splits
    }
}

/// Render splits as `label: 12ms | label: 40ms`
pub fn summarize(splits: &[(String, Duration)]) -> String {
    splits
        .iter()
        .map(|(label, at)| format!("{}: {}ms", label, at.as_millis()))
        .collect::<Vec<_>>()
        .join(" | ")
}
