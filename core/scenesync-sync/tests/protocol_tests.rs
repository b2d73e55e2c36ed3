use pretty_assertions::assert_eq;
use scenesync_sync::{
    Batch, ChangeEntry, InboundEnvelope, InstancePayload, PendingChangeSet, RemoteBatch,
    SnapshotEnvelope, BATCH_ACTION, PLUGIN_VERSION,
};
use scenesync_types::{
    ChangeAction, ChangeRecord, ChangeType, EntityPath, SerializedRecord, SessionId, Timestamp,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;

fn record(path: &str) -> SerializedRecord {
    let parsed: EntityPath = path.parse().unwrap();
    SerializedRecord::identity(
        parsed.name(),
        "Part",
        path,
        parsed.parent().map(|p| p.to_string()),
    )
}

fn settled_batch() -> Batch {
    let mut pending = PendingChangeSet::new();
    pending.upsert(
        "game.Workspace.A".parse().unwrap(),
        ChangeRecord::add(record("game.Workspace.A")),
        ChangeType::DescendantAdded,
        Timestamp::from_millis(1),
    );
    pending.upsert(
        "game.Workspace.B".parse().unwrap(),
        ChangeRecord::delete(),
        ChangeType::DescendantRemoving,
        Timestamp::from_millis(2),
    );
    Batch::from_settled(&pending.settled(Timestamp::from_millis(10), Duration::ZERO))
}

// ── Outbound ────────────────────────────────────────────────────

#[test]
fn batch_envelope_wire_shape() {
    let batch = settled_batch();
    let session = SessionId::new();
    let wire = serde_json::to_value(batch.envelope("demo", session)).unwrap();

    assert_eq!(wire["Action"], json!(BATCH_ACTION));
    assert_eq!(wire["ProjectId"], json!("demo"));
    assert_eq!(wire["PluginVersion"], json!(PLUGIN_VERSION));
    assert_eq!(wire["BatchId"], json!(batch.id));
    assert_eq!(wire["SourceId"], json!(session.to_string()));
    assert_eq!(
        wire["Changes"],
        json!([
            {
                "Action": "add",
                "InstancePath": "game.Workspace.A",
                "Instances": [{
                    "Name": "A",
                    "ClassName": "Part",
                    "Path": "game.Workspace.A",
                    "ParentPath": "game.Workspace"
                }]
            },
            {
                "Action": "delete",
                "InstancePath": "game.Workspace.B",
                "Instances": [{"Path": "game.Workspace.B"}]
            }
        ])
    );
}

#[test]
fn batch_ids_are_unique() {
    assert_ne!(settled_batch().id, settled_batch().id);
}

#[test]
fn snapshot_envelope_wire_shape() {
    let mut services = BTreeMap::new();
    services.insert("Workspace".to_string(), record("game.Workspace"));
    let snapshot = SnapshotEnvelope::new("demo", services, Timestamp::from_millis(1_700));
    let wire = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(wire["Timestamp"], json!(1_700));
    assert_eq!(wire["ProjectId"], json!("demo"));
    assert_eq!(wire["Services"]["Workspace"]["Path"], json!("game.Workspace"));
}

// ── Inbound ─────────────────────────────────────────────────────

#[test]
fn path_only_instance_decodes_as_path() {
    let payload: InstancePayload = serde_json::from_value(json!({"Path": "game.X"})).unwrap();
    assert_eq!(
        payload,
        InstancePayload::PathOnly {
            path: "game.X".to_string()
        }
    );
    let payload: InstancePayload = serde_json::from_value(json!({
        "Name": "X", "ClassName": "Part", "Path": "game.X"
    }))
    .unwrap();
    assert!(matches!(payload, InstancePayload::Record(_)));
}

#[test]
fn remote_batch_skips_malformed_entries() {
    let session = SessionId::new();
    let envelope: InboundEnvelope = serde_json::from_value(json!({
        "Action": "BatchInstanceChanged",
        "BatchId": "b-1",
        "SourceId": session.to_string(),
        "Changes": [
            {"Action": "update", "InstancePath": "game.Workspace.A",
             "Instances": [{"Name": "A", "ClassName": "Part", "Path": "game.Workspace.A"}]},
            {"Action": "explode", "InstancePath": "game.Workspace.B"},
            {"Action": "delete", "InstancePath": ""},
            "garbage",
            {"Action": "delete", "InstancePath": "game.Workspace.C"}
        ]
    }))
    .unwrap();

    let batch = RemoteBatch::decode(Timestamp::from_millis(42), envelope);
    assert_eq!(batch.key, Timestamp::from_millis(42));
    assert_eq!(batch.batch_id, "b-1");
    assert_eq!(batch.source, Some(session));
    assert_eq!(batch.skipped, 3);
    assert_eq!(batch.entries.len(), 2);

    let first = &batch.entries[0];
    assert_eq!(first.action, ChangeAction::Update);
    assert_eq!(first.timestamp, Timestamp::from_millis(42));
    assert_eq!(first.records.len(), 1);

    let last = &batch.entries[1];
    assert_eq!(last.action, ChangeAction::Delete);
    assert!(last.records.is_empty());
}

#[test]
fn envelope_without_changes_or_source_decodes_empty() {
    let envelope: InboundEnvelope = serde_json::from_value(json!({"BatchId": "x"})).unwrap();
    let batch = RemoteBatch::decode(Timestamp::from_millis(1), envelope);
    assert!(batch.entries.is_empty());
    assert_eq!(batch.source, None);
}

#[test]
fn change_entry_records_iterates_full_records_only() {
    let entry: ChangeEntry = serde_json::from_value(json!({
        "Action": "add",
        "InstancePath": "game.X",
        "Instances": [{"Path": "game.X"}, {"Name": "X", "ClassName": "Part", "Path": "game.X"}]
    }))
    .unwrap();
    assert_eq!(entry.records().count(), 1);
}
