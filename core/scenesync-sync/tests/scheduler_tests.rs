use pretty_assertions::assert_eq;
use scenesync_model::{MemoryTree, SceneTree, TreeEvent};
use scenesync_sync::{
    BatchScheduler, ChangeCapture, FlushTrigger, IdleReason, PendingChangeSet, SyncSettings,
    TickDecision, TimingConfig,
};
use scenesync_types::{ChangeRecord, ChangeType, EntityPath, SerializedRecord, Timestamp, Value};

const URL: &str = "https://proj-default-rtdb.firebaseio.com";

fn settings(timing: TimingConfig) -> SyncSettings {
    SyncSettings {
        remote_url: URL.to_string(),
        timing,
        ..SyncSettings::default()
    }
}

fn timing(settle_ms: u64, min_push_interval_ms: u64, batch_interval_ms: u64) -> TimingConfig {
    TimingConfig {
        settle_ms,
        min_push_interval_ms,
        batch_interval_ms,
        ..TimingConfig::default()
    }
}

fn secs(s: f64) -> Timestamp {
    Timestamp::from_millis((s * 1000.0) as u64)
}

fn touch(pending: &mut PendingChangeSet, name: &str, at: Timestamp) -> u64 {
    let path: EntityPath = format!("game.Workspace.{name}").parse().unwrap();
    let record = SerializedRecord::identity(name, "Part", path.to_string(), None);
    pending.upsert(
        path,
        ChangeRecord::update(record),
        ChangeType::PropertyChanged,
        at,
    )
}

fn flush(decision: TickDecision) -> scenesync_sync::FlushPlan {
    match decision {
        TickDecision::Flush(plan) => plan,
        other => panic!("expected a flush, got {other:?}"),
    }
}

// ── Settle and interval scenario ────────────────────────────────

#[test]
fn burst_settles_then_flushes_after_min_interval() {
    let settings = settings(timing(2_000, 5_000, 10_000));
    let tree = MemoryTree::with_services("game", &[("Workspace", "Workspace")]);
    let workspace = tree.children(tree.root())[0];
    let part = tree.create(workspace, "Part", "P").unwrap();
    let mut capture = ChangeCapture::new(&settings);
    let mut pending = PendingChangeSet::new();
    let mut scheduler = BatchScheduler::new(secs(0.0));

    for (at, transparency) in [(0.0, 0.2), (1.0, 0.7)] {
        tree.set_property(part, "Transparency", Value::Number(transparency))
            .unwrap();
        let event = TreeEvent::PropertyChanged {
            node: part,
            property: "Transparency".to_string(),
        };
        capture.on_event(&tree, &settings, &mut pending, &event, secs(at));
    }

    let path: EntityPath = "game.Workspace.P".parse().unwrap();
    let entry = pending.get(&path).unwrap();
    let record = entry.change.record.as_ref().unwrap();
    assert_eq!(record.properties["Transparency"], Value::Number(0.7).encode());
    assert_eq!(entry.last_mutation, secs(1.0));

    assert_eq!(
        scheduler.plan(&settings, &pending, secs(3.0)),
        TickDecision::Wait {
            settled: 1,
            unsettled: 0
        }
    );

    let plan = flush(scheduler.plan(&settings, &pending, secs(5.0)));
    assert_eq!(plan.entries.len(), 1);
    assert_eq!(plan.entries[0].path, path);
    assert_eq!(plan.trigger, FlushTrigger::MinPushInterval);
}

#[test]
fn unsettled_entries_are_left_for_a_later_tick() {
    let settings = settings(timing(2_000, 5_000, 10_000));
    let mut pending = PendingChangeSet::new();
    let mut scheduler = BatchScheduler::new(secs(0.0));
    touch(&mut pending, "Old", secs(1.0));
    touch(&mut pending, "Busy", secs(4.5));

    assert_eq!(
        scheduler.plan(&settings, &pending, secs(4.0)),
        TickDecision::Wait {
            settled: 1,
            unsettled: 1
        }
    );
    let plan = flush(scheduler.plan(&settings, &pending, secs(5.0)));
    assert_eq!(plan.entries.len(), 1);
    assert_eq!(plan.entries[0].path.name(), "Old");
    assert_eq!(plan.unsettled, 1);
}

#[test]
fn nothing_settled_means_no_flush_even_when_overdue() {
    let settings = settings(timing(2_000, 5_000, 10_000));
    let mut pending = PendingChangeSet::new();
    let mut scheduler = BatchScheduler::new(secs(0.0));
    touch(&mut pending, "Busy", secs(59.5));

    assert_eq!(
        scheduler.plan(&settings, &pending, secs(60.0)),
        TickDecision::Wait {
            settled: 0,
            unsettled: 1
        }
    );
}

// ── Triggers ────────────────────────────────────────────────────

#[test]
fn max_batch_size_forces_a_flush_before_the_interval() {
    let settings = settings(TimingConfig {
        max_batch_size: 3,
        ..timing(1_000, 5_000, 10_000)
    });
    let mut pending = PendingChangeSet::new();
    let mut scheduler = BatchScheduler::new(secs(0.0));
    for name in ["A", "B", "C"] {
        touch(&mut pending, name, secs(0.5));
    }
    touch(&mut pending, "D", secs(1.9));

    let plan = flush(scheduler.plan(&settings, &pending, secs(2.0)));
    assert_eq!(plan.trigger, FlushTrigger::MaxBatchSize);
    assert_eq!(
        plan.entries
            .iter()
            .map(|e| e.path.name().to_string())
            .collect::<Vec<_>>(),
        vec!["A", "B", "C"]
    );
}

#[test]
fn batch_interval_flushes_when_min_interval_is_longer() {
    let settings = settings(timing(1_000, 30_000, 10_000));
    let mut pending = PendingChangeSet::new();
    let mut scheduler = BatchScheduler::new(secs(0.0));
    touch(&mut pending, "A", secs(2.0));

    assert!(matches!(
        scheduler.plan(&settings, &pending, secs(9.0)),
        TickDecision::Wait { .. }
    ));
    let plan = flush(scheduler.plan(&settings, &pending, secs(10.0)));
    assert_eq!(plan.trigger, FlushTrigger::BatchInterval);
}

#[test]
fn flush_keeps_first_capture_order() {
    let settings = settings(timing(0, 0, 0));
    let mut pending = PendingChangeSet::new();
    let mut scheduler = BatchScheduler::new(secs(0.0));
    touch(&mut pending, "Parent", secs(1.0));
    touch(&mut pending, "Child", secs(1.1));
    touch(&mut pending, "Parent", secs(1.2));

    let plan = flush(scheduler.plan(&settings, &pending, secs(2.0)));
    let names: Vec<&str> = plan.entries.iter().map(|e| e.path.name()).collect();
    assert_eq!(names, vec!["Parent", "Child"]);
}

// ── Idle states ─────────────────────────────────────────────────

#[test]
fn idle_reasons() {
    let mut scheduler = BatchScheduler::new(secs(0.0));
    let mut pending = PendingChangeSet::new();
    let ready = settings(timing(0, 0, 0));

    assert_eq!(
        scheduler.plan(&ready, &pending, secs(1.0)),
        TickDecision::Idle(IdleReason::Empty)
    );

    touch(&mut pending, "A", secs(0.0));
    let disabled = SyncSettings {
        enabled: false,
        ..ready.clone()
    };
    assert_eq!(
        scheduler.plan(&disabled, &pending, secs(1.0)),
        TickDecision::Idle(IdleReason::Disabled)
    );

    let no_url = SyncSettings {
        remote_url: "http://example.com/data.json".to_string(),
        ..ready.clone()
    };
    assert_eq!(
        scheduler.plan(&no_url, &pending, secs(1.0)),
        TickDecision::Idle(IdleReason::RemoteNotReady)
    );

    flush(scheduler.plan(&ready, &pending, secs(1.0)));
    assert!(scheduler.in_flight());
    assert_eq!(
        scheduler.plan(&ready, &pending, secs(1.5)),
        TickDecision::Idle(IdleReason::PushInFlight)
    );
}

// ── Push results ────────────────────────────────────────────────

#[test]
fn successful_push_removes_entries_and_advances_clocks() {
    let settings = settings(timing(0, 5_000, 10_000));
    let mut pending = PendingChangeSet::new();
    let mut scheduler = BatchScheduler::new(secs(0.0));
    touch(&mut pending, "A", secs(1.0));

    let plan = flush(scheduler.plan(&settings, &pending, secs(6.0)));
    let removed = scheduler.on_push_result(&mut pending, &plan.entries, true, secs(6.5));

    assert_eq!(removed, 1);
    assert!(pending.is_empty());
    assert!(!scheduler.in_flight());
    assert_eq!(scheduler.last_push(), secs(6.5));
    assert_eq!(scheduler.last_batch(), secs(6.5));

    touch(&mut pending, "B", secs(7.0));
    assert!(matches!(
        scheduler.plan(&settings, &pending, secs(8.0)),
        TickDecision::Wait { .. }
    ));
}

#[test]
fn failed_push_leaves_everything_for_retry() {
    let settings = settings(timing(0, 5_000, 10_000));
    let mut pending = PendingChangeSet::new();
    let mut scheduler = BatchScheduler::new(secs(0.0));
    touch(&mut pending, "A", secs(1.0));

    let plan = flush(scheduler.plan(&settings, &pending, secs(6.0)));
    let removed = scheduler.on_push_result(&mut pending, &plan.entries, false, secs(6.5));

    assert_eq!(removed, 0);
    assert_eq!(pending.len(), 1);
    assert_eq!(scheduler.last_push(), secs(0.0));

    touch(&mut pending, "B", secs(6.6));
    let retry = flush(scheduler.plan(&settings, &pending, secs(7.0)));
    assert_eq!(retry.entries.len(), 2);
}

#[test]
fn entry_mutated_during_push_is_retained() {
    let settings = settings(timing(0, 0, 0));
    let mut pending = PendingChangeSet::new();
    let mut scheduler = BatchScheduler::new(secs(0.0));
    touch(&mut pending, "A", secs(1.0));
    touch(&mut pending, "B", secs(1.0));

    let plan = flush(scheduler.plan(&settings, &pending, secs(2.0)));
    touch(&mut pending, "B", secs(2.1));
    let removed = scheduler.on_push_result(&mut pending, &plan.entries, true, secs(2.2));

    assert_eq!(removed, 1);
    let left: Vec<&str> = pending.iter().map(|(path, _)| path.name()).collect();
    assert_eq!(left, vec!["B"]);
}
