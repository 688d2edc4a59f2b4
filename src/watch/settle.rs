use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks paths and determines when they've "settled" (no events for a full
/// quiescence window).
#[derive(Debug)]
pub struct SettleTracker {
    /// Path to the time of its most recent event
    pending: HashMap<PathBuf, Instant>,
    window: Duration,
}

impl SettleTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            window,
        }
    }

    /// Record an event for `path`, restarting its quiescence window.
    pub fn record(&mut self, path: PathBuf, now: Instant) {
        self.pending.insert(path, now);
    }

    /// Remove and return every path quiet for at least the window, sorted.
    pub fn drain_settled(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut settled: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, last)| now.duration_since(**last) >= self.window)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &settled {
            self.pending.remove(path);
        }
        settled.sort();
        settled
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
