//! Change capture, batching and reconciliation engine for scenesync.
//!
//! Mirrors a live scene tree into a remote JSON store and applies remote
//! changes back into it.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Filter**: decides per class and tag set whether an entity syncs
//! - **Serializer**: turns live entities into wire records
//! - **Dedup window**: collapses repeated host notifications
//! - **Change capture**: writes serialized changes into the pending set
//! - **Batch scheduler**: flushes settled changes on size and interval triggers
//! - **Remote gateway**: pushes batches and snapshots, pulls recent batches
//! - **Reconciler**: applies remote batches in timestamp order above a watermark
//! - **Orchestrator**: owns all of the above on one task
//!
//! ## Sync Process
//!
//! 1. **Capture**: a tree notification is deduplicated, filtered and
//!    serialized into the pending set, one entry per path
//! 2. **Settle**: an entry waits until its path stops changing
//! 3. **Flush**: settled entries are pushed as one batch under a fresh key
//! 4. **Pull**: recent batches are fetched on a slower timer
//! 5. **Apply**: entries newer than the watermark are written to the tree
//!
//! # Example
//!
//! ```
//! use scenesync_model::{MemoryTree, SceneTree};
//! use scenesync_sync::{ChangeCapture, PendingChangeSet, SyncSettings};
//! use scenesync_types::Timestamp;
//!
//! let tree = MemoryTree::with_services("game", &[("Workspace", "Workspace")]);
//! let settings = SyncSettings::default();
//! let mut capture = ChangeCapture::new(&settings);
//! let mut pending = PendingChangeSet::new();
//!
//! let workspace = tree.children(tree.root())[0];
//! let part = tree.create(workspace, "Part", "Floor").unwrap();
//! let event = scenesync_model::TreeEvent::DescendantAdded { node: part };
//! capture.on_event(&tree, &settings, &mut pending, &event, Timestamp::from_secs(1));
//! assert_eq!(pending.len(), 1);
//! ```

pub mod capture;
pub mod dedup;
mod error;
pub mod filter;
mod orchestrator;
pub mod pending;
pub mod protocol;
pub mod reconciler;
pub mod remote;
pub mod scheduler;
pub mod serializer;
pub mod settings;

pub use capture::{CaptureOutcome, ChangeCapture, Mutation, MutationKind, RemovedIdentity};
pub use dedup::DedupWindow;
pub use error::{SyncError, SyncResult, TransportHint};
pub use filter::{Category, CategoryFilter, DualGate, FilterConfig, FilterDecision, FilterRule};
pub use orchestrator::{
    create_orchestrator, create_orchestrator_with_store, OrchestratorHandle, StoreFactory,
    SyncCommand, SyncEvent, SyncOrchestrator,
};
pub use pending::{Overwrite, PendingChangeSet, PendingEntry, SettledEntry};
pub use protocol::{
    Batch, BatchEnvelope, ChangeEntry, InboundEnvelope, InstancePayload, RemoteBatch, RemoteEntry,
    SnapshotEnvelope, BATCH_ACTION, PLUGIN_VERSION,
};
pub use reconciler::{ApplyReport, Reconciler, Touched, Watermark};
pub use remote::{FirebaseStore, PullOutcome, RemoteStore};
pub use scheduler::{BatchScheduler, FlushPlan, FlushTrigger, IdleReason, TickDecision};
pub use serializer::{FieldRef, QualityRule, Serializer, SerializerConfig};
pub use settings::{RemoteEndpoint, SyncSettings, TimingConfig, UrlPolicy};
