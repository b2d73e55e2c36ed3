//! Change capture: turns host notifications into pending changes.
//!
//! Each notification passes, in order, the enabled check, entity
//! resolution, the dedup window and the category filter before it is
//! serialized and written into the [`PendingChangeSet`].
//!
//! Write priority per path:
//! - `delete` holds until flushed against later property and attribute
//!   changes; a re-add or an undo/redo that brings the entity back replaces
//!   it with `add`
//! - `add` stays `add`, with its content refreshed from the live entity
//! - anything else becomes `update`
//!
//! Refreshing re-reads every field already pending plus the new one, so a
//! burst that touches several fields flushes all of them at their latest
//! values.

use crate::dedup::DedupWindow;
use crate::filter::CategoryFilter;
use crate::pending::PendingChangeSet;
use crate::serializer::{FieldRef, Serializer};
use crate::settings::SyncSettings;
use scenesync_model::{SceneTree, TreeEvent};
use scenesync_types::{
    ChangeAction, ChangeRecord, ChangeType, EntityPath, NodeId, SerializedRecord, Timestamp,
};
use tracing::debug;

/// Kind of host mutation, as seen by capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Added,
    Removing,
    PropertyChanged,
    AttributeChanged,
    UndoRedo,
}

impl MutationKind {
    /// Label used in dedup keys.
    pub fn label(&self) -> &'static str {
        match self {
            MutationKind::Added => "added",
            MutationKind::Removing => "removing",
            MutationKind::PropertyChanged => "property",
            MutationKind::AttributeChanged => "attribute",
            MutationKind::UndoRedo => "undo-redo",
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            MutationKind::Added => ChangeType::DescendantAdded,
            MutationKind::Removing => ChangeType::DescendantRemoving,
            MutationKind::PropertyChanged => ChangeType::PropertyChanged,
            MutationKind::AttributeChanged => ChangeType::AttributeChanged,
            MutationKind::UndoRedo => ChangeType::UndoRedo,
        }
    }
}

/// Identity of a node captured just before its removal.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedIdentity {
    pub path: EntityPath,
    pub class_name: String,
    pub tags: Vec<String>,
}

/// One host mutation to capture.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// `None` when the host could not name the entity (bare undo/redo).
    pub node: Option<NodeId>,
    pub kind: MutationKind,
    /// Property or attribute name, or the undo waypoint.
    pub detail: String,
    /// Set for removals.
    pub removed: Option<RemovedIdentity>,
}

impl Mutation {
    /// Maps a tree event to a mutation. Selection changes map to nothing.
    pub fn from_event(event: &TreeEvent) -> Option<Self> {
        let mutation = match event {
            TreeEvent::DescendantAdded { node } => Mutation {
                node: Some(*node),
                kind: MutationKind::Added,
                detail: String::new(),
                removed: None,
            },
            TreeEvent::DescendantRemoving {
                node,
                path,
                class_name,
                tags,
            } => Mutation {
                node: Some(*node),
                kind: MutationKind::Removing,
                detail: String::new(),
                removed: Some(RemovedIdentity {
                    path: path.clone(),
                    class_name: class_name.clone(),
                    tags: tags.clone(),
                }),
            },
            TreeEvent::PropertyChanged { node, property } => Mutation {
                node: Some(*node),
                kind: MutationKind::PropertyChanged,
                detail: property.clone(),
                removed: None,
            },
            TreeEvent::AttributeChanged { node, attribute } => Mutation {
                node: Some(*node),
                kind: MutationKind::AttributeChanged,
                detail: attribute.clone(),
                removed: None,
            },
            TreeEvent::Undo { waypoint, node } | TreeEvent::Redo { waypoint, node } => Mutation {
                node: *node,
                kind: MutationKind::UndoRedo,
                detail: waypoint.clone(),
                removed: None,
            },
            TreeEvent::SelectionChanged { .. } => return None,
        };
        Some(mutation)
    }
}

/// What a capture call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Sync is disabled.
    Disabled,
    /// No live entity to capture.
    InvalidEntity,
    /// Collapsed by the dedup window.
    Suppressed,
    /// Rejected by the category filter.
    Filtered,
    /// A property or attribute change on a path with a pending delete.
    DroppedAfterDelete,
    /// The entity vanished before it could be serialized.
    Unserializable,
    /// Written to the pending set.
    Recorded { path: EntityPath, action: ChangeAction },
    /// Not a capturable notification.
    Ignored,
}

/// Stateful half of capture: the filter table and the dedup window.
#[derive(Debug)]
pub struct ChangeCapture {
    filter: CategoryFilter,
    dedup: DedupWindow,
}

impl ChangeCapture {
    pub fn new(settings: &SyncSettings) -> Self {
        Self {
            filter: CategoryFilter::new(&settings.filter),
            dedup: DedupWindow::new(settings.timing.dedup_window()),
        }
    }

    /// Rebuilds the filter table and resizes the dedup window.
    pub fn reconfigure(&mut self, settings: &SyncSettings) {
        self.filter = CategoryFilter::new(&settings.filter);
        self.dedup.set_window(settings.timing.dedup_window());
    }

    pub fn filter(&self) -> &CategoryFilter {
        &self.filter
    }

    pub fn dedup(&self) -> &DedupWindow {
        &self.dedup
    }

    pub fn dedup_mut(&mut self) -> &mut DedupWindow {
        &mut self.dedup
    }

    /// Captures a tree event.
    pub fn on_event(
        &mut self,
        tree: &dyn SceneTree,
        settings: &SyncSettings,
        pending: &mut PendingChangeSet,
        event: &TreeEvent,
        now: Timestamp,
    ) -> CaptureOutcome {
        match Mutation::from_event(event) {
            Some(mutation) => self.on_mutation(tree, settings, pending, &mutation, now),
            None => CaptureOutcome::Ignored,
        }
    }

    /// Captures one mutation.
    pub fn on_mutation(
        &mut self,
        tree: &dyn SceneTree,
        settings: &SyncSettings,
        pending: &mut PendingChangeSet,
        mutation: &Mutation,
        now: Timestamp,
    ) -> CaptureOutcome {
        if !settings.enabled {
            return CaptureOutcome::Disabled;
        }

        let Some((path, class_name, tags)) = resolve(tree, mutation) else {
            if settings.debug_logging {
                debug!("Ignoring {} without a live entity", mutation.kind.label());
            }
            return CaptureOutcome::InvalidEntity;
        };

        if self
            .dedup
            .should_suppress(&path, mutation.kind.label(), &mutation.detail, now)
        {
            if settings.debug_logging {
                debug!("Suppressed repeat {} {} {}", mutation.kind.label(), path, mutation.detail);
            }
            return CaptureOutcome::Suppressed;
        }

        if !self.filter.should_sync(&class_name, &tags) {
            if settings.debug_logging {
                debug!("Filtered {} ({})", path, class_name);
            }
            return CaptureOutcome::Filtered;
        }

        let existing = pending.get(&path).map(|entry| &entry.change);
        let revived = existing.is_some_and(ChangeRecord::is_delete);
        if revived && !matches!(mutation.kind, MutationKind::Added | MutationKind::UndoRedo) {
            if settings.debug_logging {
                debug!("Dropping {} on {}: delete pending", mutation.kind.label(), path);
            }
            return CaptureOutcome::DroppedAfterDelete;
        }
        let existing = existing.filter(|change| !change.is_delete());

        let change_type = mutation.kind.change_type();
        let change = if mutation.kind == MutationKind::Removing {
            ChangeRecord::delete()
        } else {
            // resolve() guarantees a live node for everything but removals
            let Some(node) = mutation.node else {
                return CaptureOutcome::InvalidEntity;
            };
            let serializer = Serializer::new(tree, &self.filter, &settings.serializer);
            let previous = existing.and_then(|change| change.record.as_ref());
            let Some(record) = serialize(&serializer, node, mutation, previous) else {
                return CaptureOutcome::Unserializable;
            };
            let record = record.with_change_type(change_type);
            let keeps_add = existing.is_some_and(|change| change.action == ChangeAction::Add);
            if mutation.kind == MutationKind::Added || keeps_add || revived {
                ChangeRecord::add(record)
            } else {
                ChangeRecord::update(record)
            }
        };

        if mutation.kind == MutationKind::PropertyChanged && mutation.detail == "Name" {
            debug!("{} renamed; the old path is not retracted remotely", path);
        }

        let action = change.action;
        pending.upsert(path.clone(), change, change_type, now);
        if settings.debug_logging {
            debug!("Captured {} {} ({:?})", action, path, change_type);
        }
        CaptureOutcome::Recorded { path, action }
    }

    /// Sweeps stale dedup keys.
    pub fn sweep(&mut self, now: Timestamp) -> usize {
        self.dedup.sweep(now)
    }
}

/// Path, class and tags of the mutated entity.
fn resolve(tree: &dyn SceneTree, mutation: &Mutation) -> Option<(EntityPath, String, Vec<String>)> {
    if let Some(removed) = &mutation.removed {
        return Some((
            removed.path.clone(),
            removed.class_name.clone(),
            removed.tags.clone(),
        ));
    }
    let node = mutation.node?;
    if !tree.is_alive(node) || node == tree.root() {
        return None;
    }
    let path = tree.full_path(node).ok()?;
    let class_name = tree.class_name(node).ok()?;
    Some((path, class_name, tree.tags(node)))
}

fn serialize(
    serializer: &Serializer<'_>,
    node: NodeId,
    mutation: &Mutation,
    previous: Option<&SerializedRecord>,
) -> Option<SerializedRecord> {
    let detail = mutation.detail.as_str();
    match (mutation.kind, previous) {
        (MutationKind::UndoRedo, _) => serializer.serialize_full(node, 0),
        (MutationKind::Added, None) => serializer.serialize_light(node),
        (MutationKind::Added, Some(previous)) => {
            let light = serializer.serialize_light(node)?;
            serializer.refresh(node, &union_of(previous, &light), None)
        }
        (MutationKind::PropertyChanged, None) => serializer.serialize_property_delta(node, detail),
        (MutationKind::PropertyChanged, Some(previous)) => {
            serializer.refresh(node, previous, Some(FieldRef::Property(detail)))
        }
        (MutationKind::AttributeChanged, None) => {
            serializer.serialize_attribute_delta(node, detail)
        }
        (MutationKind::AttributeChanged, Some(previous)) => {
            serializer.refresh(node, previous, Some(FieldRef::Attribute(detail)))
        }
        (MutationKind::Removing, _) => None,
    }
}

/// `previous` with any field names only `extra` carries added.
fn union_of(previous: &SerializedRecord, extra: &SerializedRecord) -> SerializedRecord {
    let mut merged = previous.clone();
    for (name, value) in &extra.properties {
        merged
            .properties
            .entry(name.clone())
            .or_insert_with(|| value.clone());
    }
    for (name, value) in &extra.attributes {
        merged
            .attributes
            .entry(name.clone())
            .or_insert_with(|| value.clone());
    }
    if merged.tags.is_empty() {
        merged.tags = extra.tags.clone();
    }
    merged
}
