use pretty_assertions::assert_eq;
use scenesync_sync::{RemoteEndpoint, SyncError, SyncSettings, TimingConfig, UrlPolicy};
use std::time::Duration;

fn parse(raw: &str) -> Result<RemoteEndpoint, SyncError> {
    RemoteEndpoint::parse(raw, &UrlPolicy::default())
}

// ── URL validation ──────────────────────────────────────────────

#[test]
fn plain_http_with_path_is_rejected() {
    assert!(matches!(
        parse("http://example.com/data.json"),
        Err(SyncError::Config(_))
    ));
}

#[test]
fn firebase_base_url_is_accepted() {
    let endpoint = parse("https://proj-default-rtdb.firebaseio.com").unwrap();
    assert_eq!(endpoint.as_str(), "https://proj-default-rtdb.firebaseio.com");
}

#[test]
fn regional_host_is_accepted_and_trailing_slash_dropped() {
    let endpoint = parse("https://proj-default-rtdb.europe-west1.firebasedatabase.app/").unwrap();
    assert_eq!(
        endpoint.to_string(),
        "https://proj-default-rtdb.europe-west1.firebasedatabase.app"
    );
}

#[test]
fn https_with_path_is_rejected() {
    assert!(parse("https://proj.firebaseio.com/projects.json").is_err());
    assert!(parse("https://proj.firebaseio.com/projects").is_err());
}

#[test]
fn query_and_fragment_are_rejected() {
    assert!(parse("https://proj.firebaseio.com/?auth=x").is_err());
    assert!(parse("https://proj.firebaseio.com/#top").is_err());
}

#[test]
fn unapproved_hosts_are_rejected() {
    assert!(parse("https://example.com").is_err());
    assert!(parse("https://firebaseio.com").is_err());
    assert!(parse("https://firebaseio.com.evil.net").is_err());
}

#[test]
fn empty_or_garbage_url_is_rejected() {
    assert!(parse("").is_err());
    assert!(parse("   ").is_err());
    assert!(parse("not a url").is_err());
}

#[test]
fn loopback_policy_admits_local_servers() {
    let policy = UrlPolicy::with_loopback();
    assert!(RemoteEndpoint::parse("http://127.0.0.1:9000", &policy).is_ok());
    assert!(RemoteEndpoint::parse("http://localhost:9000/", &policy).is_ok());
    assert!(RemoteEndpoint::parse("http://example.com", &policy).is_err());
}

// ── Settings ────────────────────────────────────────────────────

#[test]
fn default_settings_are_not_remote_ready() {
    let settings = SyncSettings::default();
    assert!(settings.enabled);
    assert!(settings.apply_remote);
    assert!(!settings.remote_ready());
}

#[test]
fn valid_url_makes_settings_remote_ready() {
    let settings = SyncSettings {
        remote_url: "https://proj-default-rtdb.firebaseio.com".to_string(),
        ..SyncSettings::default()
    };
    assert!(settings.remote_ready());

    let disabled = SyncSettings {
        enabled: false,
        ..settings
    };
    assert!(!disabled.remote_ready());
}

#[test]
fn project_id_with_key_characters_is_rejected() {
    for project_id in ["", "a/b", "a.b", "a$b", "a#b", "a[b]"] {
        let settings = SyncSettings {
            remote_url: "https://proj-default-rtdb.firebaseio.com".to_string(),
            project_id: project_id.to_string(),
            ..SyncSettings::default()
        };
        assert!(
            matches!(settings.remote_endpoint(), Err(SyncError::Config(_))),
            "{project_id:?}"
        );
    }
}

#[test]
fn partial_settings_fill_in_defaults() {
    let settings: SyncSettings =
        serde_json::from_str(r#"{"enabled": false, "timing": {"settle_ms": 500}}"#).unwrap();
    assert!(!settings.enabled);
    assert_eq!(settings.timing.settle(), Duration::from_millis(500));
    assert_eq!(settings.timing.min_push_interval(), Duration::from_secs(5));
    assert_eq!(settings.pull_limit, 10);
}

#[test]
fn category_toggle_goes_through_settings() {
    let mut settings = SyncSettings::default();
    assert!(settings.set_category_enabled("Terrain", true));
    assert!(!settings.set_category_enabled("Nope", true));
}

// ── Timing ──────────────────────────────────────────────────────

#[test]
fn timing_defaults() {
    let timing = TimingConfig::default();
    assert_eq!(timing.tick(), Duration::from_millis(250));
    assert_eq!(timing.dedup_window(), Duration::from_millis(250));
    assert_eq!(timing.settle(), Duration::from_secs(2));
    assert_eq!(timing.batch_interval(), Duration::from_secs(10));
    assert_eq!(timing.pull_interval(), Duration::from_secs(15));
    assert_eq!(timing.max_batch_size, 50);
}

#[test]
fn timer_periods_never_reach_zero() {
    let timing = TimingConfig {
        tick_ms: 0,
        pull_interval_ms: 0,
        dedup_sweep_ms: 0,
        ..TimingConfig::default()
    };
    assert_eq!(timing.tick(), Duration::from_millis(1));
    assert_eq!(timing.pull_interval(), Duration::from_millis(1));
    assert_eq!(timing.dedup_sweep(), Duration::from_millis(1));
}
