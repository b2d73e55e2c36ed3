//! Remote store abstraction.

use crate::error::SyncResult;
use crate::protocol::{Batch, RemoteBatch, SnapshotEnvelope};
use async_trait::async_trait;
use scenesync_types::Timestamp;

/// Result of a pull.
#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    /// Batches ordered by ascending key.
    Batches(Vec<RemoteBatch>),
    /// The store holds no batches.
    NothingNew,
    /// Fetching is switched off for this store.
    Disabled,
}

impl PullOutcome {
    /// The pulled batches; empty for the other outcomes.
    pub fn into_batches(self) -> Vec<RemoteBatch> {
        match self {
            PullOutcome::Batches(batches) => batches,
            PullOutcome::NothingNew | PullOutcome::Disabled => Vec::new(),
        }
    }
}

/// A JSON store that holds one project's change log and snapshot.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short provider name for logs.
    fn provider_name(&self) -> &'static str;

    /// Writes a batch under a fresh key and returns the key.
    async fn push_batch(&self, batch: &Batch) -> SyncResult<Timestamp>;

    /// Overwrites the project's full-tree snapshot.
    async fn push_snapshot(&self, snapshot: &SnapshotEnvelope) -> SyncResult<()>;

    /// Fetches the newest `limit` batches.
    async fn pull_recent(&self, limit: usize) -> SyncResult<PullOutcome>;
}
