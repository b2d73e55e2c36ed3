//! Serialized records and pending change records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Wire form of an entity, or of an entity subtree when `children` is set.
///
/// Property and attribute values are held in their encoded wire form so a
/// record received from the remote store can be decoded field by field.
/// Every collection defaults to empty because the remote store drops empty
/// arrays and objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SerializedRecord {
    pub name: String,
    pub class_name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Present only on full/subtree serializations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<SerializedRecord>>,
    /// Set on stub records emitted past the depth bound.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    /// How the change carrying this record was classified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
}

impl SerializedRecord {
    /// A record carrying only identity fields.
    pub fn identity(
        name: impl Into<String>,
        class_name: impl Into<String>,
        path: impl Into<String>,
        parent_path: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            path: path.into(),
            parent_path,
            properties: BTreeMap::new(),
            attributes: BTreeMap::new(),
            tags: Vec::new(),
            children: None,
            truncated: false,
            change_type: None,
        }
    }

    /// Tags the record with the change classification that produced it.
    #[must_use]
    pub fn with_change_type(mut self, change_type: ChangeType) -> Self {
        self.change_type = Some(change_type);
        self
    }

    /// Number of records in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(SerializedRecord::subtree_len)
            .sum::<usize>()
    }
}

/// The action a pending change performs on its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Add,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChangeAction::Add => "add",
            ChangeAction::Update => "update",
            ChangeAction::Delete => "delete",
        })
    }
}

/// Classification of a captured host mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    DescendantAdded,
    DescendantRemoving,
    PropertyChanged,
    AttributeChanged,
    UndoRedo,
}

impl ChangeType {
    /// The pending action this classification produces on an empty path.
    pub fn action(&self) -> ChangeAction {
        match self {
            ChangeType::DescendantAdded => ChangeAction::Add,
            ChangeType::DescendantRemoving => ChangeAction::Delete,
            ChangeType::PropertyChanged | ChangeType::AttributeChanged | ChangeType::UndoRedo => {
                ChangeAction::Update
            }
        }
    }
}

/// One pending mutation for one entity path.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub action: ChangeAction,
    /// Absent for deletes.
    pub record: Option<SerializedRecord>,
}

impl ChangeRecord {
    pub fn add(record: SerializedRecord) -> Self {
        Self {
            action: ChangeAction::Add,
            record: Some(record),
        }
    }

    pub fn update(record: SerializedRecord) -> Self {
        Self {
            action: ChangeAction::Update,
            record: Some(record),
        }
    }

    pub fn delete() -> Self {
        Self {
            action: ChangeAction::Delete,
            record: None,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.action == ChangeAction::Delete
    }
}
