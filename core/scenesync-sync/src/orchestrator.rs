//! Sync orchestrator: drives capture, scheduling, push and pull on one task.
//!
//! All sync state (pending set, dedup window, scheduler clocks, watermark)
//! is owned by the orchestrator task, so a flush snapshot and a capture
//! can never interleave. Network calls run on spawned tasks and report back
//! through an internal channel; capture keeps running while they are in
//! flight.
//!
//! ```text
//!   SceneTree ──events──▶ ┌──────────────┐ ──push──▶ RemoteStore
//!   Handle ───commands──▶ │ orchestrator │ ◀─pull───
//!   ticks/timers ───────▶ └──────────────┘ ──SyncEvent──▶ caller
//! ```

use crate::capture::ChangeCapture;
use crate::error::{SyncError, SyncResult, TransportHint};
use crate::pending::{PendingChangeSet, SettledEntry};
use crate::protocol::{Batch, SnapshotEnvelope};
use crate::reconciler::{ApplyReport, Reconciler};
use crate::remote::{FirebaseStore, PullOutcome, RemoteStore};
use crate::scheduler::{BatchScheduler, TickDecision};
use crate::serializer::Serializer;
use crate::settings::{SyncSettings, TimingConfig};
use scenesync_model::{SceneTree, TreeEvent};
use scenesync_types::{SessionId, Timestamp};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Capacity of the command and event channels.
const CHANNEL_CAPACITY: usize = 64;

/// Builds the remote store for a settings snapshot.
pub type StoreFactory =
    Arc<dyn Fn(&SyncSettings, SessionId) -> SyncResult<Arc<dyn RemoteStore>> + Send + Sync>;

/// Commands accepted by a running orchestrator.
#[derive(Debug, Clone)]
pub enum SyncCommand {
    /// Replace the settings snapshot.
    UpdateSettings(Box<SyncSettings>),
    /// Serialize the whole tree and push it as the project snapshot.
    PushSnapshot,
    /// Pull immediately instead of waiting for the pull timer.
    PullNow,
    Shutdown,
}

/// Notifications emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    BatchPushed {
        key: Timestamp,
        changes: usize,
        /// Entries left pending because they changed during the push.
        retained: usize,
    },
    PushFailed {
        error: String,
        hint: Option<TransportHint>,
        snapshot: bool,
    },
    SnapshotPushed {
        services: usize,
    },
    RemoteApplied(ApplyReport),
    PullFailed {
        error: String,
        hint: Option<TransportHint>,
    },
    /// The remote settings are unusable; push and pull are off until fixed.
    ConfigInvalid {
        reason: String,
    },
}

/// Cloneable handle for commanding a running orchestrator.
#[derive(Clone)]
pub struct OrchestratorHandle {
    command_tx: mpsc::Sender<SyncCommand>,
}

impl OrchestratorHandle {
    pub async fn send(&self, command: SyncCommand) -> SyncResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    pub async fn update_settings(&self, settings: SyncSettings) -> SyncResult<()> {
        self.send(SyncCommand::UpdateSettings(Box::new(settings))).await
    }

    pub async fn push_snapshot(&self) -> SyncResult<()> {
        self.send(SyncCommand::PushSnapshot).await
    }

    pub async fn pull_now(&self) -> SyncResult<()> {
        self.send(SyncCommand::PullNow).await
    }

    pub async fn shutdown(&self) -> SyncResult<()> {
        self.send(SyncCommand::Shutdown).await
    }
}

/// Result of a spawned network call.
enum Completion {
    Pushed {
        flushed: Vec<SettledEntry>,
        result: SyncResult<Timestamp>,
    },
    Pulled(SyncResult<PullOutcome>),
    Snapshot {
        services: usize,
        result: SyncResult<()>,
    },
}

struct Timers {
    tick: Interval,
    pull: Interval,
    sweep: Interval,
}

impl Timers {
    fn new(timing: &TimingConfig) -> Self {
        let make = |period| {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer
        };
        Self {
            tick: make(timing.tick()),
            pull: make(timing.pull_interval()),
            sweep: make(timing.dedup_sweep()),
        }
    }
}

/// Owns all sync state and runs the event loop.
pub struct SyncOrchestrator {
    tree: Arc<dyn SceneTree>,
    settings: SyncSettings,
    session: SessionId,
    store_factory: StoreFactory,
    store: Option<Arc<dyn RemoteStore>>,
    capture: ChangeCapture,
    pending: PendingChangeSet,
    scheduler: BatchScheduler,
    reconciler: Reconciler,
    pull_in_flight: bool,
    tree_rx: mpsc::UnboundedReceiver<TreeEvent>,
    command_rx: mpsc::Receiver<SyncCommand>,
    event_tx: mpsc::Sender<SyncEvent>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

/// Creates an orchestrator that talks to a Firebase store.
///
/// Subscribes to `tree` immediately; events raised before
/// [`SyncOrchestrator::run`] is awaited are queued.
pub fn create_orchestrator(
    tree: Arc<dyn SceneTree>,
    settings: SyncSettings,
) -> (SyncOrchestrator, OrchestratorHandle, mpsc::Receiver<SyncEvent>) {
    let factory: StoreFactory = Arc::new(|settings, session| {
        let store: Arc<dyn RemoteStore> = Arc::new(FirebaseStore::from_settings(settings, session)?);
        Ok(store)
    });
    create_orchestrator_with_store(tree, settings, factory)
}

/// Creates an orchestrator with a custom store factory.
pub fn create_orchestrator_with_store(
    tree: Arc<dyn SceneTree>,
    settings: SyncSettings,
    store_factory: StoreFactory,
) -> (SyncOrchestrator, OrchestratorHandle, mpsc::Receiver<SyncEvent>) {
    let (tree_tx, tree_rx) = mpsc::unbounded_channel();
    tree.subscribe(Arc::new(move |event: &TreeEvent| {
        let _ = tree_tx.send(event.clone());
    }));

    let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();
    let session = SessionId::new();
    let now = Timestamp::now();

    let orchestrator = SyncOrchestrator {
        capture: ChangeCapture::new(&settings),
        pending: PendingChangeSet::new(),
        scheduler: BatchScheduler::new(now),
        reconciler: Reconciler::new(Some(session)),
        pull_in_flight: false,
        store: None,
        tree,
        settings,
        session,
        store_factory,
        tree_rx,
        command_rx,
        event_tx,
        completion_tx,
        completion_rx,
    };
    (orchestrator, OrchestratorHandle { command_tx }, event_rx)
}

impl SyncOrchestrator {
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Runs until a [`SyncCommand::Shutdown`] arrives or every handle is
    /// dropped.
    pub async fn run(mut self) {
        info!("Sync orchestrator started (session {})", self.session);
        self.rebuild_store();
        if self.settings.snapshot_on_start {
            self.start_snapshot();
        }

        let mut timers = Timers::new(&self.settings.timing);
        loop {
            tokio::select! {
                Some(event) = self.tree_rx.recv() => {
                    self.on_tree_event(&event);
                }
                command = self.command_rx.recv() => {
                    match command {
                        None | Some(SyncCommand::Shutdown) => break,
                        Some(SyncCommand::UpdateSettings(settings)) => {
                            self.apply_settings(*settings);
                            timers = Timers::new(&self.settings.timing);
                        }
                        Some(SyncCommand::PushSnapshot) => self.start_snapshot(),
                        Some(SyncCommand::PullNow) => self.start_pull(),
                    }
                }
                Some(done) = self.completion_rx.recv() => {
                    self.on_completion(done);
                }
                _ = timers.tick.tick() => {
                    self.on_tick();
                }
                _ = timers.pull.tick() => {
                    self.start_pull();
                }
                _ = timers.sweep.tick() => {
                    let swept = self.capture.sweep(Timestamp::now());
                    if swept > 0 {
                        debug!("Swept {} dedup entries", swept);
                    }
                }
            }
        }

        if !self.pending.is_empty() {
            info!("Stopping with {} unflushed changes", self.pending.len());
        }
        info!("Sync orchestrator stopped");
    }

    // ── Settings ─────────────────────────────────────────────────

    fn apply_settings(&mut self, settings: SyncSettings) {
        self.settings = settings;
        self.capture.reconfigure(&self.settings);
        self.rebuild_store();
        info!(
            "Settings updated (enabled={}, apply_remote={})",
            self.settings.enabled, self.settings.apply_remote
        );
    }

    fn rebuild_store(&mut self) {
        self.store = None;
        if !self.settings.enabled {
            return;
        }
        match (self.store_factory)(&self.settings, self.session) {
            Ok(store) => {
                info!("Remote store ready ({})", store.provider_name());
                self.store = Some(store);
            }
            Err(e) => {
                warn!("Remote sync disabled: {}", e);
                self.emit(SyncEvent::ConfigInvalid {
                    reason: e.to_string(),
                });
            }
        }
    }

    // ── Capture and push ─────────────────────────────────────────

    fn on_tree_event(&mut self, event: &TreeEvent) {
        self.capture.on_event(
            self.tree.as_ref(),
            &self.settings,
            &mut self.pending,
            event,
            Timestamp::now(),
        );
    }

    fn on_tick(&mut self) {
        let now = Timestamp::now();
        match self.scheduler.plan(&self.settings, &self.pending, now) {
            TickDecision::Flush(plan) => {
                if self.settings.debug_logging {
                    debug!(
                        "Flushing {} settled changes ({:?}, {} unsettled)",
                        plan.entries.len(),
                        plan.trigger,
                        plan.unsettled
                    );
                }
                self.start_push(plan.entries);
            }
            TickDecision::Wait { settled, unsettled } if self.settings.debug_logging => {
                debug!("Holding {} settled and {} unsettled changes", settled, unsettled);
            }
            _ => {}
        }
    }

    fn start_push(&mut self, flushed: Vec<SettledEntry>) {
        let Some(store) = self.store.clone() else {
            self.scheduler
                .on_push_result(&mut self.pending, &flushed, false, Timestamp::now());
            return;
        };
        let batch = Batch::from_settled(&flushed);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = store.push_batch(&batch).await;
            let _ = completion_tx.send(Completion::Pushed { flushed, result });
        });
    }

    fn start_snapshot(&mut self) {
        let Some(store) = self.store.clone() else {
            warn!("Snapshot skipped: remote store is not configured");
            return;
        };
        let serializer = Serializer::new(
            self.tree.as_ref(),
            self.capture.filter(),
            &self.settings.serializer,
        );
        let services = serializer.serialize_services();
        let count = services.len();
        let snapshot = SnapshotEnvelope::new(&self.settings.project_id, services, Timestamp::now());
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = store.push_snapshot(&snapshot).await;
            let _ = completion_tx.send(Completion::Snapshot {
                services: count,
                result,
            });
        });
    }

    // ── Pull and apply ───────────────────────────────────────────

    fn start_pull(&mut self) {
        if !self.settings.enabled || !self.settings.apply_remote || self.pull_in_flight {
            return;
        }
        let Some(store) = self.store.clone() else {
            return;
        };
        self.pull_in_flight = true;
        let limit = self.settings.pull_limit;
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = store.pull_recent(limit).await;
            let _ = completion_tx.send(Completion::Pulled(result));
        });
    }

    fn apply_pulled(&mut self, outcome: PullOutcome) {
        let batches = match outcome {
            PullOutcome::Batches(batches) => batches,
            PullOutcome::NothingNew => return,
            PullOutcome::Disabled => {
                debug!("Remote fetch disabled");
                return;
            }
        };

        let report = self.reconciler.apply(
            self.tree.as_ref(),
            &self.settings,
            Some(&mut self.pending),
            &batches,
        );

        // The tree raised notifications for every write above; they are
        // already queued. Prime the dedup window and drain them now so they
        // are not captured as local edits.
        let now = Timestamp::now();
        let dedup = self.capture.dedup_mut();
        for touched in &report.touched {
            dedup.record(&touched.path, touched.kind.label(), &touched.detail, now);
        }
        while let Ok(event) = self.tree_rx.try_recv() {
            self.capture.on_event(
                self.tree.as_ref(),
                &self.settings,
                &mut self.pending,
                &event,
                now,
            );
        }

        if report.applied + report.failed + report.local_newer > 0 {
            self.emit(SyncEvent::RemoteApplied(report));
        }
    }

    // ── Completions ──────────────────────────────────────────────

    fn on_completion(&mut self, done: Completion) {
        let now = Timestamp::now();
        match done {
            Completion::Pushed { flushed, result } => match result {
                Ok(key) => {
                    let removed =
                        self.scheduler
                            .on_push_result(&mut self.pending, &flushed, true, now);
                    info!("Pushed {} changes under key {}", flushed.len(), key);
                    self.emit(SyncEvent::BatchPushed {
                        key,
                        changes: flushed.len(),
                        retained: flushed.len() - removed,
                    });
                }
                Err(e) => {
                    self.scheduler
                        .on_push_result(&mut self.pending, &flushed, false, now);
                    warn!("Push of {} changes failed: {}", flushed.len(), e);
                    self.emit(SyncEvent::PushFailed {
                        hint: e.hint(),
                        error: e.to_string(),
                        snapshot: false,
                    });
                }
            },
            Completion::Pulled(result) => {
                self.pull_in_flight = false;
                match result {
                    Ok(outcome) => self.apply_pulled(outcome),
                    Err(e) => {
                        warn!("Pull failed: {}", e);
                        self.emit(SyncEvent::PullFailed {
                            hint: e.hint(),
                            error: e.to_string(),
                        });
                    }
                }
            }
            Completion::Snapshot { services, result } => match result {
                Ok(()) => {
                    info!("Pushed snapshot of {} services", services);
                    self.emit(SyncEvent::SnapshotPushed { services });
                }
                Err(e) => {
                    warn!("Snapshot push failed: {}", e);
                    self.emit(SyncEvent::PushFailed {
                        hint: e.hint(),
                        error: e.to_string(),
                        snapshot: true,
                    });
                }
            },
        }
    }

    fn emit(&self, event: SyncEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            debug!("Dropping sync event: {}", e);
        }
    }
}
