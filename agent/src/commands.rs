//! Subcommand implementations, kept out of `main` so they can be tested.

use crate::scene::{load_scene, save_scene, snapshot_of};
use crate::AgentConfig;
use anyhow::{Context, Result};
use scenesync_model::MemoryTree;
use scenesync_sync::{
    create_orchestrator, RemoteBatch, RemoteEndpoint, RemoteStore, SyncEvent, UrlPolicy,
};
use scenesync_types::{ChangeAction, EntityPath, SessionId, Timestamp};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Validates a remote base URL.
pub fn check_url(raw: &str, allow_loopback: bool) -> Result<RemoteEndpoint> {
    let policy = if allow_loopback {
        UrlPolicy::with_loopback()
    } else {
        UrlPolicy::default()
    };
    Ok(RemoteEndpoint::parse(raw, &policy)?)
}

/// Pushes the scene at `scene` as the project snapshot. Returns the number
/// of services sent.
pub async fn push_snapshot(config: &AgentConfig, scene: &Path) -> Result<usize> {
    let tree = load_scene(scene, &config.root_name)?;
    let store = config.open_store(SessionId::new())?;
    let snapshot = snapshot_of(&tree, &config.sync);
    store
        .push_snapshot(&snapshot)
        .await
        .context("snapshot push failed")?;
    info!("Pushed snapshot of {} services to {}", snapshot.services.len(), store.endpoint());
    Ok(snapshot.services.len())
}

/// One remote batch, as listed by `pull`.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub key: Timestamp,
    pub batch_id: String,
    pub source: Option<SessionId>,
    pub changes: Vec<(ChangeAction, EntityPath)>,
    pub skipped: usize,
}

impl From<&RemoteBatch> for BatchSummary {
    fn from(batch: &RemoteBatch) -> Self {
        Self {
            key: batch.key,
            batch_id: batch.batch_id.clone(),
            source: batch.source,
            changes: batch
                .entries
                .iter()
                .map(|entry| (entry.action, entry.path.clone()))
                .collect(),
            skipped: batch.skipped,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({} changes", self.key, self.batch_id, self.changes.len())?;
        if self.skipped > 0 {
            write!(f, ", {} malformed", self.skipped)?;
        }
        f.write_str(")")?;
        for (action, path) in &self.changes {
            write!(f, "\n  {action} {path}")?;
        }
        Ok(())
    }
}

/// Lists the newest `limit` remote batches, oldest first.
pub async fn pull(config: &AgentConfig, limit: usize) -> Result<Vec<BatchSummary>> {
    let store = config.open_store(SessionId::new())?;
    let batches = store
        .pull_recent(limit)
        .await
        .context("pull failed")?
        .into_batches();
    Ok(batches.iter().map(BatchSummary::from).collect())
}

/// What a mirror run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorSummary {
    pub applied: usize,
    pub pushed: usize,
    pub failures: usize,
    /// Services written back to the scene file.
    pub saved: usize,
}

/// Mirrors the project into the scene file until `shutdown` resolves, then
/// writes the mirrored tree back.
///
/// A missing scene file starts from an empty tree with a `Workspace`.
pub async fn mirror(
    config: &AgentConfig,
    scene: &Path,
    shutdown: impl Future<Output = ()>,
) -> Result<MirrorSummary> {
    let tree: Arc<MemoryTree> = if scene.exists() {
        Arc::new(load_scene(scene, &config.root_name)?)
    } else {
        info!("{} does not exist yet; starting from an empty scene", scene.display());
        Arc::new(MemoryTree::with_services(
            &config.root_name,
            &[("Workspace", "Workspace")],
        ))
    };

    let mut settings = config.sync.clone();
    settings.apply_remote = true;
    settings.remote_endpoint().context("cannot mirror without a remote")?;

    let (orchestrator, handle, mut events) = create_orchestrator(tree.clone(), settings.clone());
    info!("Mirroring as session {}", orchestrator.session());
    let running = tokio::spawn(orchestrator.run());

    let mut summary = MirrorSummary::default();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                record_event(&mut summary, event);
            }
        }
    }

    handle.shutdown().await?;
    running.await.context("orchestrator task failed")?;

    summary.saved = save_scene(tree.as_ref(), &settings, scene)?;
    Ok(summary)
}

fn record_event(summary: &mut MirrorSummary, event: SyncEvent) {
    match event {
        SyncEvent::RemoteApplied(report) => {
            info!(
                "Applied {} remote changes (watermark {})",
                report.applied, report.watermark
            );
            summary.applied += report.applied;
        }
        SyncEvent::BatchPushed { changes, .. } => summary.pushed += changes,
        SyncEvent::SnapshotPushed { services } => debug!("Snapshot of {} services pushed", services),
        SyncEvent::PushFailed { error, .. } | SyncEvent::PullFailed { error, .. } => {
            warn!("{}", error);
            summary.failures += 1;
        }
        SyncEvent::ConfigInvalid { reason } => {
            warn!("Remote configuration rejected: {}", reason);
            summary.failures += 1;
        }
    }
}
