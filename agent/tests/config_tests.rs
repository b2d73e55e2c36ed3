use pretty_assertions::assert_eq;
use scenesync_agent::AgentConfig;
use scenesync_sync::TimingConfig;
use scenesync_types::SessionId;
use std::io::Write;

#[test]
fn defaults_without_a_file() {
    let config = AgentConfig::load(None).unwrap();
    assert_eq!(config.root_name, "game");
    assert!(config.sync.enabled);
    assert_eq!(config.sync.timing, TimingConfig::default());
}

#[test]
fn partial_toml_keeps_other_defaults() {
    let config = AgentConfig::from_toml_str(
        r#"
        [sync]
        remote_url = "https://demo-default-rtdb.firebaseio.com"
        project_id = "demo"

        [sync.timing]
        settle_ms = 1000
        "#,
    )
    .unwrap();

    assert_eq!(config.root_name, "game");
    assert_eq!(config.sync.project_id, "demo");
    assert_eq!(config.sync.timing.settle_ms, 1_000);
    assert_eq!(config.sync.timing.tick_ms, 250);
    assert!(config.sync.remote_ready());
}

#[test]
fn malformed_toml_is_rejected() {
    let err = AgentConfig::from_toml_str("[sync\nremote_url = 3").unwrap_err();
    assert!(err.to_string().contains("invalid agent config"));
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "root_name = \"place\"\n[sync]\npull_limit = 3").unwrap();

    let config = AgentConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.root_name, "place");
    assert_eq!(config.sync.pull_limit, 3);
}

#[test]
fn missing_file_names_the_path() {
    let err = AgentConfig::load(Some(std::path::Path::new("/nonexistent/agent.toml"))).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/agent.toml"));
}

#[test]
fn store_requires_a_remote_url() {
    let config = AgentConfig::default();
    let err = config.open_store(SessionId::new()).err().unwrap();
    assert!(err.to_string().contains("remote store is not configured"));
}
