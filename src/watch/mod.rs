//! Directory watching with per-file debounce.
//!
//! The notify callback runs on notify's own thread and only forwards the
//! paths of relevant events into an unbounded channel. A debounce task owns
//! a [`SettleTracker`] and, on every tick, drains the paths that have been
//! quiet for the whole quiescence window. Each tick that settles at least one
//! path yields exactly one [`ResyncRequested`] for the orchestrator.
//!
//! Three rapid writes to one file therefore produce one signal, fired once
//! the window has passed after the last write.

pub mod settle;

pub use settle::SettleTracker;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("none of the watch roots exist: {}", joined(.0))]
    NoRoots(Vec<PathBuf>),
}

fn joined(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Some watched files changed and have settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncRequested {
    /// The settled paths, sorted.
    pub paths: Vec<PathBuf>,
}

/// Watches gallery roots until dropped.
///
/// Dropping it stops notify and the debounce task, which closes the signal
/// channel.
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    debounce: JoinHandle<()>,
}

impl DirectoryWatcher {
    /// Start watching `roots` recursively. Must be called inside a tokio
    /// runtime. Roots that do not exist are skipped with a warning; it is an
    /// error when none exists.
    pub fn spawn(
        roots: &[PathBuf],
        quiescence: Duration,
    ) -> Result<(Self, mpsc::Receiver<ResyncRequested>), WatchError> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<PathBuf>();
        let (signal_tx, signal_rx) = mpsc::channel(16);

        let filter_roots = roots.to_vec();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    for path in event.paths {
                        if is_ignored(&path, &filter_roots) {
                            continue;
                        }
                        // The receiver is gone only during shutdown.
                        let _ = raw_tx.send(path);
                    }
                }
                Err(e) => warn!("file watcher error: {e}"),
            },
            Config::default(),
        )?;

        let mut armed = 0;
        for root in roots {
            if root.is_dir() {
                watcher.watch(root, RecursiveMode::Recursive)?;
                info!(dir = %root.display(), "watching");
                armed += 1;
            } else {
                warn!(dir = %root.display(), "watch root does not exist, skipping");
            }
        }
        if armed == 0 {
            return Err(WatchError::NoRoots(roots.to_vec()));
        }

        let debounce = tokio::spawn(debounce(raw_rx, signal_tx, quiescence));
        Ok((
            Self {
                _watcher: watcher,
                debounce,
            },
            signal_rx,
        ))
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.debounce.abort();
    }
}

/// True when `path` has a hidden component below whichever root contains it
/// (or, outside every root, when its file name is hidden).
pub fn is_ignored(path: &Path, roots: &[PathBuf]) -> bool {
    let relative = roots
        .iter()
        .find_map(|root| path.strip_prefix(root).ok())
        .unwrap_or_else(|| Path::new(path.file_name().unwrap_or_default()));
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Turn raw change events into settled resync signals.
///
/// Returns when either channel closes.
pub async fn debounce(
    mut raw_rx: mpsc::UnboundedReceiver<PathBuf>,
    signal_tx: mpsc::Sender<ResyncRequested>,
    window: Duration,
) {
    let mut tracker = SettleTracker::new(window);
    let mut tick = tokio::time::interval((window / 4).max(Duration::from_millis(10)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = raw_rx.recv() => match event {
                Some(path) => {
                    debug!(path = %path.display(), "change event");
                    tracker.record(path, Instant::now());
                }
                None => return,
            },
            _ = tick.tick() => {
                let paths = tracker.drain_settled(Instant::now());
                if !paths.is_empty() {
                    debug!(count = paths.len(), "changes settled");
                    if signal_tx.send(ResyncRequested { paths }).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
