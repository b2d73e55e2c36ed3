//! Sync configuration.
//!
//! [`SyncSettings`] is an immutable snapshot: capture and scheduling read it
//! per event and per tick, and a settings change replaces the whole value
//! through the orchestrator rather than mutating shared flags.

use crate::error::{SyncError, SyncResult};
use crate::filter::FilterConfig;
use crate::serializer::SerializerConfig;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Characters the remote store forbids in a key segment.
const FORBIDDEN_KEY_CHARS: &[char] = &['.', '$', '#', '[', ']', '/'];

/// Everything the core consumes from the configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Master switch for capture, push and pull.
    pub enabled: bool,
    /// Apply pulled remote changes to the local tree. When off the core runs
    /// push-only: nothing is pulled and the watermark stays put.
    pub apply_remote: bool,
    /// Log every captured event and scheduler decision.
    pub debug_logging: bool,
    /// Base URL of the remote JSON store.
    pub remote_url: String,
    /// Project key under `/projects` on the remote store.
    pub project_id: String,
    /// How many recent remote batches to request per pull. Zero disables
    /// fetching.
    pub pull_limit: usize,
    /// Push a full snapshot when the orchestrator starts.
    pub snapshot_on_start: bool,
    pub url_policy: UrlPolicy,
    pub timing: TimingConfig,
    pub filter: FilterConfig,
    pub serializer: SerializerConfig,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            apply_remote: true,
            debug_logging: false,
            remote_url: String::new(),
            project_id: "default".to_string(),
            pull_limit: 10,
            snapshot_on_start: false,
            url_policy: UrlPolicy::default(),
            timing: TimingConfig::default(),
            filter: FilterConfig::default(),
            serializer: SerializerConfig::default(),
        }
    }
}

impl SyncSettings {
    /// Validates the remote URL and project id.
    pub fn remote_endpoint(&self) -> SyncResult<RemoteEndpoint> {
        validate_project_id(&self.project_id)?;
        RemoteEndpoint::parse(&self.remote_url, &self.url_policy)
    }

    /// True when push and pull may run.
    pub fn remote_ready(&self) -> bool {
        self.enabled && self.remote_endpoint().is_ok()
    }

    /// Flips a category's enabled flag. Returns false if no such category.
    pub fn set_category_enabled(&mut self, name: &str, enabled: bool) -> bool {
        self.filter.set_enabled(name, enabled)
    }
}

fn validate_project_id(project_id: &str) -> SyncResult<()> {
    if project_id.is_empty() {
        return Err(SyncError::Config("project id is empty".to_string()));
    }
    if let Some(c) = project_id.chars().find(|c| FORBIDDEN_KEY_CHARS.contains(c)) {
        return Err(SyncError::Config(format!(
            "project id {project_id:?} contains forbidden character {c:?}"
        )));
    }
    Ok(())
}

/// Timing knobs for dedup, settling, flushing and pulling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Scheduler tick period.
    pub tick_ms: u64,
    /// Identical capture events closer than this collapse into one.
    pub dedup_window_ms: u64,
    /// How often stale dedup entries are swept.
    pub dedup_sweep_ms: u64,
    /// Quiet period after an entity's last mutation before it may flush.
    pub settle_ms: u64,
    /// Minimum gap between successful pushes.
    pub min_push_interval_ms: u64,
    /// Batch boundary period.
    pub batch_interval_ms: u64,
    /// Settled-entry count that forces a flush regardless of interval.
    pub max_batch_size: usize,
    /// Remote pull period.
    pub pull_interval_ms: u64,
    /// Per-request HTTP timeout.
    pub http_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            dedup_window_ms: 250,
            dedup_sweep_ms: 30_000,
            settle_ms: 2_000,
            min_push_interval_ms: 5_000,
            batch_interval_ms: 10_000,
            max_batch_size: 50,
            pull_interval_ms: 15_000,
            http_timeout_ms: 30_000,
        }
    }
}

impl TimingConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn dedup_sweep(&self) -> Duration {
        Duration::from_millis(self.dedup_sweep_ms.max(1))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn min_push_interval(&self) -> Duration {
        Duration::from_millis(self.min_push_interval_ms)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn pull_interval(&self) -> Duration {
        Duration::from_millis(self.pull_interval_ms.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms.max(1))
    }
}

/// Which remote URLs are acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlPolicy {
    /// Allowed schemes.
    pub schemes: Vec<String>,
    /// Allowed host suffixes (`.firebaseio.com` admits `x.firebaseio.com`).
    pub host_suffixes: Vec<String>,
    /// Hosts allowed verbatim.
    pub hosts: Vec<String>,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            schemes: vec!["https".to_string()],
            host_suffixes: vec![
                ".firebaseio.com".to_string(),
                ".firebasedatabase.app".to_string(),
            ],
            hosts: Vec::new(),
        }
    }
}

impl UrlPolicy {
    /// Admits plain-HTTP loopback servers in addition to the defaults.
    /// Intended for local development stores and tests.
    pub fn with_loopback() -> Self {
        let mut policy = Self::default();
        policy.schemes.push("http".to_string());
        policy.hosts.push("127.0.0.1".to_string());
        policy.hosts.push("localhost".to_string());
        policy
    }

    fn admits_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|h| h.eq_ignore_ascii_case(&host))
            || self.host_suffixes.iter().any(|suffix| {
                let suffix = suffix.to_ascii_lowercase();
                host.len() > suffix.len() && host.ends_with(&suffix)
            })
    }
}

/// A validated remote base URL, without trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    base_url: String,
}

impl RemoteEndpoint {
    /// Validates `raw` against `policy`.
    ///
    /// The URL must use an approved scheme, name an approved host, and be a
    /// bare base: no path beyond `/`, no query, no fragment.
    pub fn parse(raw: &str, policy: &UrlPolicy) -> SyncResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SyncError::Config("remote URL is not set".to_string()));
        }
        let url = Url::parse(raw)
            .map_err(|e| SyncError::Config(format!("invalid remote URL {raw:?}: {e}")))?;

        if !policy.schemes.iter().any(|s| s == url.scheme()) {
            return Err(SyncError::Config(format!(
                "scheme {:?} is not allowed (expected one of {:?})",
                url.scheme(),
                policy.schemes
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::Config(format!("remote URL {raw:?} has no host")))?;
        if !policy.admits_host(host) {
            return Err(SyncError::Config(format!("host {host:?} is not an approved store")));
        }
        if url.path() != "/" && !url.path().is_empty() {
            return Err(SyncError::Config(format!(
                "remote URL must be a bare base URL, found path {:?}",
                url.path()
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(SyncError::Config(
                "remote URL must not carry a query or fragment".to_string(),
            ));
        }

        Ok(Self {
            base_url: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// The base URL, without trailing slash.
    pub fn as_str(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base_url)
    }
}
