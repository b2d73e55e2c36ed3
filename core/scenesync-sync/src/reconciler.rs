//! Reconciler: applies pulled remote batches to the local tree.
//!
//! Entries newer than the watermark are applied in ascending timestamp
//! order, arrival order breaking ties. A failing entry is logged and
//! skipped; it never holds back the watermark or the entries after it.
//! Every tree write is recorded in the returned [`ApplyReport`] so the
//! caller can keep the resulting host notifications from being captured as
//! local edits.

use crate::capture::MutationKind;
use crate::error::{SyncError, SyncResult};
use crate::pending::{Overwrite, PendingChangeSet};
use crate::protocol::{RemoteBatch, RemoteEntry};
use crate::settings::SyncSettings;
use scenesync_model::{SceneTree, TreeError};
use scenesync_types::{ChangeAction, EntityPath, NodeId, SerializedRecord, SessionId, Timestamp, Value};
use tracing::{debug, info, warn};

/// Timestamp of the newest remote change already applied. Never moves
/// backwards and is not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Watermark(Timestamp);

impl Watermark {
    pub fn new() -> Self {
        Self(Timestamp::ZERO)
    }

    pub fn get(&self) -> Timestamp {
        self.0
    }

    /// Moves the watermark forward to `to`. Returns false if `to` is not
    /// newer.
    pub fn advance(&mut self, to: Timestamp) -> bool {
        if to > self.0 {
            self.0 = to;
            true
        } else {
            false
        }
    }

    /// True if an entry stamped `at` was already applied.
    pub fn covers(&self, at: Timestamp) -> bool {
        at <= self.0
    }
}

/// One tree write made while applying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Touched {
    pub path: EntityPath,
    pub kind: MutationKind,
    pub detail: String,
}

/// Summary of one [`Reconciler::apply`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Entries applied.
    pub applied: usize,
    /// Entries that failed and were skipped.
    pub failed: usize,
    /// Entries at or below the watermark.
    pub stale: usize,
    /// Entries pushed by this session.
    pub own: usize,
    /// Entries overridden by a newer pending local change.
    pub local_newer: usize,
    /// Older pending local changes retracted because an applied entry
    /// replaced them.
    pub superseded: usize,
    /// Watermark after the call.
    pub watermark: Timestamp,
    pub touched: Vec<Touched>,
}

impl ApplyReport {
    fn touch(&mut self, path: &EntityPath, kind: MutationKind, detail: &str) {
        self.touched.push(Touched {
            path: path.clone(),
            kind,
            detail: detail.to_string(),
        });
    }
}

/// Applies remote batches and owns the watermark.
#[derive(Debug, Clone)]
pub struct Reconciler {
    watermark: Watermark,
    session: Option<SessionId>,
}

impl Reconciler {
    /// `session` identifies this process's own pushes, which are skipped.
    pub fn new(session: Option<SessionId>) -> Self {
        Self {
            watermark: Watermark::new(),
            session,
        }
    }

    pub fn watermark(&self) -> Timestamp {
        self.watermark.get()
    }

    /// Applies `batches`. Does nothing when remote application is disabled.
    ///
    /// `pending` is consulted so an entry older than an unflushed local edit
    /// of the same path does not clobber it. Older local edits that an
    /// applied entry replaces are retracted from it.
    pub fn apply(
        &mut self,
        tree: &dyn SceneTree,
        settings: &SyncSettings,
        mut pending: Option<&mut PendingChangeSet>,
        batches: &[RemoteBatch],
    ) -> ApplyReport {
        let mut report = ApplyReport {
            watermark: self.watermark.get(),
            ..ApplyReport::default()
        };
        if !settings.apply_remote {
            return report;
        }

        let mut newest = self.watermark.get();
        let mut queue: Vec<&RemoteEntry> = Vec::new();
        for batch in batches {
            if self.watermark.covers(batch.key) {
                report.stale += batch.entries.len();
                continue;
            }
            newest = newest.max(batch.key);
            if self.session.is_some() && batch.source == self.session {
                report.own += batch.entries.len();
                continue;
            }
            for entry in &batch.entries {
                if self.watermark.covers(entry.timestamp) {
                    report.stale += 1;
                } else {
                    queue.push(entry);
                }
            }
        }
        // Stable: arrival order breaks timestamp ties.
        queue.sort_by_key(|entry| entry.timestamp);

        for entry in queue {
            newest = newest.max(entry.timestamp);
            if let Some(local) = pending.as_deref().and_then(|p| p.last_mutation(&entry.path))
                && local > entry.timestamp
            {
                debug!("Keeping local {} (edited at {}, remote {})", entry.path, local, entry.timestamp);
                report.local_newer += 1;
                continue;
            }
            let first_write = report.touched.len();
            match apply_entry(tree, entry, &mut report) {
                Ok(()) => {
                    report.applied += 1;
                    if let Some(pending) = pending.as_deref_mut() {
                        let retracted = supersede(pending, entry, &report.touched[first_write..]);
                        report.superseded += retracted;
                    }
                }
                Err(e) => {
                    warn!("Skipping remote {} {}: {}", entry.action, entry.path, e);
                    report.failed += 1;
                }
            }
        }

        self.watermark.advance(newest);
        report.watermark = self.watermark.get();
        if report.applied > 0 || report.failed > 0 {
            info!(
                "Applied {} remote changes ({} skipped), watermark {}",
                report.applied, report.failed, report.watermark
            );
        }
        report
    }
}

/// Retracts the pending local content that `entry` just overwrote.
fn supersede(pending: &mut PendingChangeSet, entry: &RemoteEntry, writes: &[Touched]) -> usize {
    let mut overwrites: Vec<(&EntityPath, Overwrite)> = Vec::new();
    if entry.action == ChangeAction::Delete {
        overwrites.push((
            &entry.path,
            Overwrite {
                entity: true,
                ..Overwrite::default()
            },
        ));
    }
    for write in writes {
        let at = match overwrites.iter().position(|(path, _)| *path == &write.path) {
            Some(at) => at,
            None => {
                overwrites.push((&write.path, Overwrite::default()));
                overwrites.len() - 1
            }
        };
        let overwrite = &mut overwrites[at].1;
        match write.kind {
            MutationKind::PropertyChanged => {
                overwrite.properties.insert(write.detail.clone());
            }
            MutationKind::AttributeChanged => {
                overwrite.attributes.insert(write.detail.clone());
            }
            MutationKind::Added | MutationKind::Removing | MutationKind::UndoRedo => {
                overwrite.entity = true;
            }
        }
    }

    let mut retracted = 0;
    for (path, overwrite) in &overwrites {
        if pending.supersede(path, entry.timestamp, overwrite) {
            debug!("Retracted local {} replaced by remote change at {}", path, entry.timestamp);
            retracted += 1;
        }
    }
    retracted
}

fn apply_entry(tree: &dyn SceneTree, entry: &RemoteEntry, report: &mut ApplyReport) -> SyncResult<()> {
    match entry.action {
        ChangeAction::Delete => delete_path(tree, &entry.path, report),
        ChangeAction::Add | ChangeAction::Update => {
            let record = entry.records.first().ok_or_else(|| {
                SyncError::Decode(format!("{} carries no instance record", entry.path))
            })?;
            apply_record(tree, &entry.path, record, report)
        }
    }
}

fn delete_path(tree: &dyn SceneTree, path: &EntityPath, report: &mut ApplyReport) -> SyncResult<()> {
    let Some(node) = tree.find_by_path(path) else {
        debug!("{} already absent", path);
        return Ok(());
    };
    let mut doomed = Vec::new();
    collect_paths(tree, node, &mut doomed);
    tree.destroy(node)?;
    for path in &doomed {
        report.touch(path, MutationKind::Removing, "");
    }
    Ok(())
}

fn collect_paths(tree: &dyn SceneTree, node: NodeId, into: &mut Vec<EntityPath>) {
    if let Ok(path) = tree.full_path(node) {
        into.push(path);
    }
    for child in tree.children(node) {
        collect_paths(tree, child, into);
    }
}

/// Writes `record` at `path`, creating the node if it is missing, then
/// recurses into nested children.
fn apply_record(
    tree: &dyn SceneTree,
    path: &EntityPath,
    record: &SerializedRecord,
    report: &mut ApplyReport,
) -> SyncResult<()> {
    let node = match tree.find_by_path(path) {
        Some(node) => {
            if let Ok(class_name) = tree.class_name(node)
                && class_name != record.class_name
            {
                warn!(
                    "{} is a {} locally but a {} remotely; updating in place",
                    path, class_name, record.class_name
                );
            }
            node
        }
        None => create_at(tree, path, record, report)?,
    };

    for (property, raw) in &record.properties {
        let value = match Value::decode(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Skipping {}.{}: {}", path, property, e);
                continue;
            }
        };
        match tree.set_property(node, property, value) {
            Ok(()) => report.touch(path, MutationKind::PropertyChanged, property),
            Err(e) => warn!("Skipping {}.{}: {}", path, property, e),
        }
    }

    for (attribute, raw) in &record.attributes {
        let value = if Value::is_removal(raw) {
            None
        } else {
            match Value::decode(raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Skipping attribute {} on {}: {}", attribute, path, e);
                    continue;
                }
            }
        };
        match tree.set_attribute(node, attribute, value) {
            Ok(()) => report.touch(path, MutationKind::AttributeChanged, attribute),
            Err(e) => warn!("Skipping attribute {} on {}: {}", attribute, path, e),
        }
    }

    // An empty list cannot be told apart from an omitted one, so it leaves
    // the local tags alone.
    if !record.tags.is_empty()
        && let Err(e) = tree.set_tags(node, &record.tags)
    {
        warn!("Skipping tags on {}: {}", path, e);
    }

    if !record.truncated {
        for child in record.children.iter().flatten() {
            let child_path = path.child(child.name.clone());
            if let Err(e) = apply_record(tree, &child_path, child, report) {
                warn!("Skipping remote child {}: {}", child_path, e);
            }
        }
    }
    Ok(())
}

fn create_at(
    tree: &dyn SceneTree,
    path: &EntityPath,
    record: &SerializedRecord,
    report: &mut ApplyReport,
) -> SyncResult<NodeId> {
    if record.class_name.is_empty() {
        return Err(SyncError::Decode(format!("{path} has no class name")));
    }
    let parent_path = path
        .parent()
        .ok_or_else(|| SyncError::Tree(TreeError::Rejected(format!("cannot create root {path}"))))?;
    let parent = tree
        .find_by_path(&parent_path)
        .ok_or_else(|| SyncError::Decode(format!("parent {parent_path} of {path} does not exist")))?;
    let node = tree.create(parent, &record.class_name, path.name())?;
    report.touch(path, MutationKind::Added, "");
    debug!("Created {} ({})", path, record.class_name);
    Ok(node)
}
