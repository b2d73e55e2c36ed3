//! Scene files: a snapshot envelope on disk, loaded into a [`MemoryTree`].

use anyhow::{Context, Result};
use scenesync_model::{MemoryTree, SceneTree};
use scenesync_sync::{
    CategoryFilter, Reconciler, RemoteBatch, RemoteEntry, Serializer, SnapshotEnvelope,
    SyncSettings,
};
use scenesync_types::{ChangeAction, EntityPath, Timestamp};
use std::path::Path;
use tracing::{info, warn};

/// Builds a tree holding the snapshot's services.
///
/// The root takes its name from the service paths, falling back to
/// `root_name` for an empty snapshot. Services that cannot be placed are
/// logged and left out.
pub fn scene_from_snapshot(snapshot: &SnapshotEnvelope, root_name: &str) -> Result<MemoryTree> {
    let mut entries = Vec::with_capacity(snapshot.services.len());
    for (name, record) in &snapshot.services {
        let path: EntityPath = record
            .path
            .parse()
            .with_context(|| format!("service {name} has an invalid path"))?;
        entries.push(RemoteEntry {
            timestamp: Timestamp::from_millis(1),
            action: ChangeAction::Add,
            path,
            records: vec![record.clone()],
        });
    }

    let root = entries
        .first()
        .and_then(|entry| entry.path.segments().first().cloned())
        .unwrap_or_else(|| root_name.to_string());
    let tree = MemoryTree::new(&root);

    let batch = RemoteBatch {
        key: Timestamp::from_millis(1),
        batch_id: "scene".to_string(),
        source: None,
        entries,
        skipped: 0,
    };
    let report = Reconciler::new(None).apply(&tree, &SyncSettings::default(), None, &[batch]);
    if report.failed > 0 {
        warn!("{} services could not be placed under {}", report.failed, root);
    }
    Ok(tree)
}

/// Reads a scene file written by [`save_scene`] or pulled from the store.
pub fn load_scene(path: &Path, root_name: &str) -> Result<MemoryTree> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scene {}", path.display()))?;
    let snapshot: SnapshotEnvelope = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a scene snapshot", path.display()))?;
    let tree = scene_from_snapshot(&snapshot, root_name)?;
    info!("Loaded {} nodes from {}", tree.len(), path.display());
    Ok(tree)
}

/// Serializes every service under the root.
pub fn snapshot_of(tree: &dyn SceneTree, settings: &SyncSettings) -> SnapshotEnvelope {
    let filter = CategoryFilter::new(&settings.filter);
    let services = Serializer::new(tree, &filter, &settings.serializer).serialize_services();
    SnapshotEnvelope::new(&settings.project_id, services, Timestamp::now())
}

/// Writes the tree to `path` and returns the number of services saved.
pub fn save_scene(tree: &dyn SceneTree, settings: &SyncSettings, path: &Path) -> Result<usize> {
    let snapshot = snapshot_of(tree, settings);
    let json = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, json).with_context(|| format!("failed to write scene {}", path.display()))?;
    info!("Saved {} services to {}", snapshot.services.len(), path.display());
    Ok(snapshot.services.len())
}
