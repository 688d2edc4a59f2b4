//! Serializes sync passes and publishes after the ones that changed
//! something.
//!
//! ## State machine
//!
//! ```text
//!             trigger                 trigger
//!   Idle ─────────────▶ Syncing ─────────────▶ SyncingWithPending ─┐
//!    ▲                   │  ▲                     │        ▲        │ trigger
//!    └── pass complete ──┘  └──── pass complete ──┘        └────────┘
//! ```
//!
//! At most one pass runs at any time and at most one more is queued. A
//! trigger is never dropped: a trigger that arrives during a pass guarantees
//! another full pass after it, which observes everything that happened.
//!
//! ## Publishing
//!
//! After a pass the orchestrator publishes when a catalog changed. When a
//! publish fails the orchestrator owes one; with `retry_stranded` the next
//! pass publishes even if it found nothing new, so a rejected push is not
//! left stranded until the next content change.

use crate::metadata::MetadataReader;
use crate::publish::{Ack, PublishError, Publisher};
use crate::sync::{self, PassReport, SyncError, SyncSettings};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Publish summary of the startup pass.
pub const INITIAL_SUMMARY: &str = "Initial Sync";
/// Publish summary when only an owed publish is retried.
pub const RETRY_SUMMARY: &str = "Retry publish";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    SyncingWithPending,
}

impl SyncState {
    /// Apply a trigger. Returns true when a pass must start now.
    pub fn on_trigger(&mut self) -> bool {
        match self {
            SyncState::Idle => {
                *self = SyncState::Syncing;
                true
            }
            SyncState::Syncing | SyncState::SyncingWithPending => {
                *self = SyncState::SyncingWithPending;
                false
            }
        }
    }

    /// Apply the completion of the running pass. Returns true when the
    /// queued pass must start now.
    pub fn on_pass_complete(&mut self) -> bool {
        match self {
            SyncState::SyncingWithPending => {
                *self = SyncState::Syncing;
                true
            }
            SyncState::Syncing | SyncState::Idle => {
                *self = SyncState::Idle;
                false
            }
        }
    }
}

/// What happened to publishing after a pass.
#[derive(Debug)]
pub enum PublishStatus {
    NotNeeded,
    /// Would have published, but this is a dry run.
    DryRun { summary: String },
    Published(Ack),
    Failed(PublishError),
}

#[derive(Debug)]
pub struct PassOutcome {
    pub report: PassReport,
    pub publish: PublishStatus,
}

/// Counters for a finished [`Orchestrator::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub passes: usize,
    pub published: usize,
    pub publish_failures: usize,
}

pub struct Orchestrator {
    settings: Arc<SyncSettings>,
    reader: Arc<dyn MetadataReader>,
    publisher: Arc<dyn Publisher>,
    retry_stranded: bool,
    publish_owed: bool,
    state: SyncState,
}

impl Orchestrator {
    pub fn new(
        settings: SyncSettings,
        reader: Arc<dyn MetadataReader>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            reader,
            publisher,
            retry_stranded: true,
            publish_owed: false,
            state: SyncState::Idle,
        }
    }

    pub fn with_retry_stranded(mut self, retry: bool) -> Self {
        self.retry_stranded = retry;
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Whether a failed publish is waiting to be retried.
    pub fn publish_owed(&self) -> bool {
        self.publish_owed
    }

    /// The unconditional startup pass. Fails when no configured gallery
    /// directory could be read.
    pub async fn initial_pass(&mut self) -> Result<PassOutcome, SyncError> {
        let outcome = self.pass_task(Some(INITIAL_SUMMARY)).await;
        self.absorb(&outcome);
        if outcome.report.readable_count() == 0 {
            return Err(SyncError::NoReadableGalleries);
        }
        Ok(outcome)
    }

    /// Run passes for incoming triggers until the channel closes and no pass
    /// is running or queued.
    pub async fn run<T: Send + 'static>(mut self, mut triggers: mpsc::Receiver<T>) -> RunStats {
        let (done_tx, mut done_rx) = mpsc::channel::<PassOutcome>(1);
        let mut stats = RunStats::default();
        let mut closed = false;

        loop {
            if closed && self.state == SyncState::Idle {
                break;
            }
            tokio::select! {
                biased;
                trigger = triggers.recv(), if !closed => match trigger {
                    Some(_) => {
                        if self.state.on_trigger() {
                            self.spawn_pass(&done_tx);
                        } else {
                            info!("change detected during sync, another pass queued");
                        }
                    }
                    None => closed = true,
                },
                Some(outcome) = done_rx.recv() => {
                    stats.passes += 1;
                    match &outcome.publish {
                        PublishStatus::Published(_) => stats.published += 1,
                        PublishStatus::Failed(_) => stats.publish_failures += 1,
                        PublishStatus::NotNeeded | PublishStatus::DryRun { .. } => {}
                    }
                    self.absorb(&outcome);
                    if self.state.on_pass_complete() {
                        self.spawn_pass(&done_tx);
                    }
                }
                else => break,
            }
        }
        stats
    }

    fn spawn_pass(&self, done_tx: &mpsc::Sender<PassOutcome>) {
        let task = self.pass_task(None);
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let outcome = task.await;
            // The receiver lives as long as the run loop.
            let _ = done_tx.send(outcome).await;
        });
    }

    /// A self-contained future for one pass plus its publish decision.
    fn pass_task(
        &self,
        summary: Option<&'static str>,
    ) -> impl Future<Output = PassOutcome> + Send + use<> {
        let settings = Arc::clone(&self.settings);
        let reader = Arc::clone(&self.reader);
        let publisher = Arc::clone(&self.publisher);
        let retry_owed = self.retry_stranded && self.publish_owed;

        async move {
            let minted_at = chrono::Utc::now().timestamp_millis();
            let pass_settings = Arc::clone(&settings);
            let report = match tokio::task::spawn_blocking(move || {
                sync::run_pass(&pass_settings, reader.as_ref(), minted_at)
            })
            .await
            {
                Ok(report) => report,
                Err(e) => {
                    error!("sync pass aborted: {e}");
                    PassReport::default()
                }
            };

            let summary = if report.changed() {
                Some(summary.map(String::from).unwrap_or_else(|| report.summary()))
            } else if retry_owed {
                Some(RETRY_SUMMARY.to_string())
            } else {
                None
            };

            let publish = match summary {
                None => PublishStatus::NotNeeded,
                Some(summary) if settings.dry_run => {
                    info!(%summary, "[dry run] would publish");
                    PublishStatus::DryRun { summary }
                }
                Some(summary) => match publisher.publish(&summary).await {
                    Ok(ack) => PublishStatus::Published(ack),
                    Err(e) => {
                        error!("publish failed: {e}");
                        PublishStatus::Failed(e)
                    }
                },
            };

            PassOutcome { report, publish }
        }
    }

    fn absorb(&mut self, outcome: &PassOutcome) {
        match &outcome.publish {
            PublishStatus::Published(_) => self.publish_owed = false,
            PublishStatus::Failed(_) => {
                self.publish_owed = true;
                if self.retry_stranded {
                    warn!("publish will be retried after the next pass");
                }
            }
            PublishStatus::NotNeeded | PublishStatus::DryRun { .. } => {}
        }
    }
}
