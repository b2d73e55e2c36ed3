use scenesync_model::{MemoryTree, SceneTree};
use scenesync_sync::{
    create_orchestrator, SyncEvent, SyncSettings, TimingConfig, TransportHint, UrlPolicy,
};
use scenesync_types::{Value, Vector3};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_for(server: &MockServer) -> SyncSettings {
    SyncSettings {
        remote_url: server.uri(),
        project_id: "demo".to_string(),
        url_policy: UrlPolicy::with_loopback(),
        timing: TimingConfig {
            tick_ms: 20,
            settle_ms: 0,
            min_push_interval_ms: 0,
            pull_interval_ms: 60_000,
            http_timeout_ms: 2_000,
            ..TimingConfig::default()
        },
        ..SyncSettings::default()
    }
}

fn game() -> Arc<MemoryTree> {
    Arc::new(MemoryTree::with_services("game", &[("Workspace", "Workspace")]))
}

async fn mount_empty_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/projects/demo/changes.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(server)
        .await;
}

async fn wait_for(
    events: &mut mpsc::Receiver<SyncEvent>,
    mut wanted: impl FnMut(&SyncEvent) -> bool,
) -> SyncEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(event) if wanted(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for sync event")
}

// ── Push ────────────────────────────────────────────────────────

#[tokio::test]
async fn local_edit_is_pushed() {
    let server = MockServer::start().await;
    mount_empty_listing(&server).await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/projects/demo/changes/\d+\.json$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tree = game();
    let (orchestrator, handle, mut events) = create_orchestrator(tree.clone(), settings_for(&server));
    let running = tokio::spawn(orchestrator.run());

    let workspace = tree.children(tree.root())[0];
    let part = tree.create(workspace, "Part", "Crate").unwrap();
    tree.set_property(part, "Size", Vector3::new(2.0, 2.0, 2.0).into())
        .unwrap();

    let pushed = wait_for(&mut events, |e| matches!(e, SyncEvent::BatchPushed { .. })).await;
    let SyncEvent::BatchPushed { changes, .. } = pushed else {
        unreachable!();
    };
    assert!(changes >= 1);

    let puts: Vec<serde_json::Value> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(puts[0]["Changes"][0]["InstancePath"], "game.Workspace.Crate");
    assert_eq!(puts[0]["Changes"][0]["Action"], "add");

    handle.shutdown().await.unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}

#[tokio::test]
async fn failed_push_is_reported_with_hint() {
    let server = MockServer::start().await;
    mount_empty_listing(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Permission denied"))
        .mount(&server)
        .await;

    let tree = game();
    let (orchestrator, handle, mut events) = create_orchestrator(tree.clone(), settings_for(&server));
    let running = tokio::spawn(orchestrator.run());

    let workspace = tree.children(tree.root())[0];
    tree.create(workspace, "Part", "Crate").unwrap();

    let failed = wait_for(&mut events, |e| matches!(e, SyncEvent::PushFailed { .. })).await;
    assert!(matches!(
        failed,
        SyncEvent::PushFailed {
            hint: Some(TransportHint::Forbidden),
            snapshot: false,
            ..
        }
    ));

    // The change stays pending and is retried on a later tick.
    wait_for(&mut events, |e| matches!(e, SyncEvent::PushFailed { .. })).await;

    handle.shutdown().await.unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}

#[tokio::test]
async fn snapshot_command_pushes_datamodel() {
    let server = MockServer::start().await;
    mount_empty_listing(&server).await;
    Mock::given(method("PUT"))
        .and(path("/projects/demo/datamodel.json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let tree = game();
    let (orchestrator, handle, mut events) = create_orchestrator(tree.clone(), settings_for(&server));
    let running = tokio::spawn(orchestrator.run());

    handle.push_snapshot().await.unwrap();
    let event = wait_for(&mut events, |e| matches!(e, SyncEvent::SnapshotPushed { .. })).await;
    assert_eq!(event, SyncEvent::SnapshotPushed { services: 1 });

    handle.shutdown().await.unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}

// ── Configuration ───────────────────────────────────────────────

#[tokio::test]
async fn invalid_url_is_reported_and_nothing_is_sent() {
    let server = MockServer::start().await;
    let settings = SyncSettings {
        remote_url: format!("{}/nested/path", server.uri()),
        ..settings_for(&server)
    };

    let tree = game();
    let (orchestrator, handle, mut events) = create_orchestrator(tree.clone(), settings);
    let running = tokio::spawn(orchestrator.run());

    let event = wait_for(&mut events, |e| matches!(e, SyncEvent::ConfigInvalid { .. })).await;
    let SyncEvent::ConfigInvalid { reason } = event else {
        unreachable!();
    };
    assert!(reason.contains("bare base URL"), "{reason}");

    let workspace = tree.children(tree.root())[0];
    tree.create(workspace, "Part", "Crate").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.received_requests().await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}

#[tokio::test]
async fn corrected_settings_enable_push() {
    let server = MockServer::start().await;
    mount_empty_listing(&server).await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/projects/demo/changes/\d+\.json$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let broken = SyncSettings {
        remote_url: String::new(),
        ..settings_for(&server)
    };

    let tree = game();
    let (orchestrator, handle, mut events) = create_orchestrator(tree.clone(), broken);
    let running = tokio::spawn(orchestrator.run());
    wait_for(&mut events, |e| matches!(e, SyncEvent::ConfigInvalid { .. })).await;

    let workspace = tree.children(tree.root())[0];
    tree.create(workspace, "Part", "Crate").unwrap();
    handle.update_settings(settings_for(&server)).await.unwrap();

    wait_for(&mut events, |e| matches!(e, SyncEvent::BatchPushed { .. })).await;

    handle.shutdown().await.unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}

// ── Pull ────────────────────────────────────────────────────────

#[tokio::test]
async fn remote_change_is_applied_without_echo() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects/demo/changes.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "1700000000000": {
                "Action": "BatchInstanceChanged",
                "BatchId": "remote-1",
                "SourceId": "6f1c2b8e-1d7a-4a52-9d8e-2c7b5f0e9a11",
                "Changes": [{
                    "Action": "add",
                    "InstancePath": "game.Workspace.Remote",
                    "Instances": [{
                        "Name": "Remote",
                        "ClassName": "Part",
                        "Path": "game.Workspace.Remote",
                        "Properties": {"Transparency": 0.5},
                        "Attributes": {"Owner": "alice"}
                    }]
                }]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tree = game();
    let (orchestrator, handle, mut events) = create_orchestrator(tree.clone(), settings_for(&server));
    let running = tokio::spawn(orchestrator.run());

    let event = wait_for(&mut events, |e| matches!(e, SyncEvent::RemoteApplied(_))).await;
    let SyncEvent::RemoteApplied(report) = event else {
        unreachable!();
    };
    assert_eq!(report.applied, 1);

    let node = tree
        .find_by_path(&"game.Workspace.Remote".parse().unwrap())
        .unwrap();
    assert_eq!(tree.get_property(node, "Transparency").unwrap(), Value::Number(0.5));
    assert_eq!(tree.get_attribute(node, "Owner"), Some(Value::String("alice".to_string())));

    // Several ticks pass; the applied change must not come back as a push.
    tokio::time::sleep(Duration::from_millis(150)).await;

    // A second pull of the same listing applies nothing.
    handle.pull_now().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, SyncEvent::RemoteApplied(_) | SyncEvent::BatchPushed { .. }));
    }

    handle.shutdown().await.unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}

#[tokio::test]
async fn pull_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let tree = game();
    let (orchestrator, handle, mut events) = create_orchestrator(tree.clone(), settings_for(&server));
    let running = tokio::spawn(orchestrator.run());

    let event = wait_for(&mut events, |e| matches!(e, SyncEvent::PullFailed { .. })).await;
    assert!(matches!(
        event,
        SyncEvent::PullFailed {
            hint: Some(TransportHint::Server),
            ..
        }
    ));

    handle.shutdown().await.unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}

#[tokio::test]
async fn push_only_mode_never_pulls() {
    let server = MockServer::start().await;
    let settings = SyncSettings {
        apply_remote: false,
        ..settings_for(&server)
    };

    let tree = game();
    let (orchestrator, handle, _events) = create_orchestrator(tree.clone(), settings);
    let running = tokio::spawn(orchestrator.run());

    handle.pull_now().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.received_requests().await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
    timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}

// ── Lifecycle ───────────────────────────────────────────────────

#[tokio::test]
async fn dropping_every_handle_stops_the_loop() {
    let server = MockServer::start().await;
    mount_empty_listing(&server).await;

    let (orchestrator, handle, _events) = create_orchestrator(game(), settings_for(&server));
    let running = tokio::spawn(orchestrator.run());
    drop(handle);

    timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
}
