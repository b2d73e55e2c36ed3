//! Wire envelopes exchanged with the remote store.
//!
//! Outbound batches are written under `changes/{key}` where the key is a
//! millisecond timestamp; the full-tree snapshot is written to `datamodel`.
//! Inbound batches are decoded one change entry at a time so a single
//! malformed entry does not discard its neighbours.

use crate::pending::SettledEntry;
use scenesync_types::{ChangeAction, EntityPath, SerializedRecord, SessionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

/// Version stamped on every envelope.
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `Action` of a batch envelope.
pub const BATCH_ACTION: &str = "BatchInstanceChanged";

/// One instance carried by a change entry: a full record, or only a path
/// for deletes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstancePayload {
    Record(SerializedRecord),
    PathOnly {
        #[serde(rename = "Path")]
        path: String,
    },
}

/// One change within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeEntry {
    pub action: ChangeAction,
    pub instance_path: String,
    #[serde(default)]
    pub instances: Vec<InstancePayload>,
}

impl ChangeEntry {
    /// Builds the wire entry for one settled change.
    pub fn from_settled(entry: &SettledEntry) -> Self {
        let path = entry.path.to_string();
        let instances = match &entry.change.record {
            Some(record) if !entry.change.is_delete() => {
                vec![InstancePayload::Record(record.clone())]
            }
            _ => vec![InstancePayload::PathOnly { path: path.clone() }],
        };
        Self {
            action: entry.change.action,
            instance_path: path,
            instances,
        }
    }

    /// The full records carried by this entry.
    pub fn records(&self) -> impl Iterator<Item = &SerializedRecord> {
        self.instances.iter().filter_map(|instance| match instance {
            InstancePayload::Record(record) => Some(record),
            InstancePayload::PathOnly { .. } => None,
        })
    }
}

/// Outbound batch envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchEnvelope {
    pub action: String,
    pub changes: Vec<ChangeEntry>,
    pub batch_id: String,
    pub plugin_version: String,
    pub project_id: String,
    /// Session that pushed the batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

/// A batch of settled changes ready to push.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub id: String,
    pub entries: Vec<ChangeEntry>,
}

impl Batch {
    /// Builds a batch from settled entries, keeping their order.
    pub fn from_settled(entries: &[SettledEntry]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entries: entries.iter().map(ChangeEntry::from_settled).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wraps the batch for the wire.
    pub fn envelope(&self, project_id: &str, source: SessionId) -> BatchEnvelope {
        BatchEnvelope {
            action: BATCH_ACTION.to_string(),
            changes: self.entries.clone(),
            batch_id: self.id.clone(),
            plugin_version: PLUGIN_VERSION.to_string(),
            project_id: project_id.to_string(),
            source_id: Some(source.to_string()),
        }
    }
}

/// Full-tree snapshot envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnapshotEnvelope {
    pub timestamp: Timestamp,
    pub plugin_version: String,
    pub project_id: String,
    /// Direct children of the root, keyed by name.
    #[serde(default)]
    pub services: BTreeMap<String, SerializedRecord>,
}

impl SnapshotEnvelope {
    pub fn new(
        project_id: &str,
        services: BTreeMap<String, SerializedRecord>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            timestamp,
            plugin_version: PLUGIN_VERSION.to_string(),
            project_id: project_id.to_string(),
            services,
        }
    }
}

/// Batch envelope as read back from the store. Changes stay raw until
/// [`RemoteBatch::decode`] checks them individually.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InboundEnvelope {
    pub action: String,
    pub changes: Vec<serde_json::Value>,
    pub batch_id: String,
    pub plugin_version: String,
    pub project_id: String,
    pub source_id: Option<String>,
}

/// One decoded remote change, stamped with its batch key.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEntry {
    pub timestamp: Timestamp,
    pub action: ChangeAction,
    pub path: EntityPath,
    pub records: Vec<SerializedRecord>,
}

/// A batch pulled from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteBatch {
    /// The store key the batch was written under.
    pub key: Timestamp,
    pub batch_id: String,
    pub source: Option<SessionId>,
    pub entries: Vec<RemoteEntry>,
    /// Change entries that failed to decode.
    pub skipped: usize,
}

impl RemoteBatch {
    /// Decodes an envelope, skipping change entries that do not parse.
    pub fn decode(key: Timestamp, envelope: InboundEnvelope) -> Self {
        let source = envelope
            .source_id
            .as_deref()
            .and_then(|raw| SessionId::parse(raw).ok());
        let mut entries = Vec::with_capacity(envelope.changes.len());
        let mut skipped = 0;
        for raw in envelope.changes {
            match decode_entry(key, raw) {
                Ok(entry) => entries.push(entry),
                Err(reason) => {
                    warn!("Skipping change in batch {}: {}", key, reason);
                    skipped += 1;
                }
            }
        }
        Self {
            key,
            batch_id: envelope.batch_id,
            source,
            entries,
            skipped,
        }
    }
}

fn decode_entry(key: Timestamp, raw: serde_json::Value) -> Result<RemoteEntry, String> {
    let entry: ChangeEntry = serde_json::from_value(raw).map_err(|e| e.to_string())?;
    let path: EntityPath = entry
        .instance_path
        .parse()
        .map_err(|e: scenesync_types::Error| e.to_string())?;
    let records = entry.records().cloned().collect();
    Ok(RemoteEntry {
        timestamp: key,
        action: entry.action,
        path,
        records,
    })
}
