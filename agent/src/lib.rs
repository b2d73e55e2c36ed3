//! Headless scenesync agent.
//!
//! Wraps the sync core around an in-memory scene so a project can be
//! inspected, seeded or mirrored without a host editor:
//! - `check-url` validates a remote base URL
//! - `push-snapshot` uploads a scene file as the project snapshot
//! - `pull` lists the newest remote batches
//! - `mirror` keeps a scene file in step with the remote change log

pub mod commands;
pub mod scene;

use anyhow::{Context, Result};
use scenesync_sync::{FirebaseStore, SyncSettings};
use scenesync_types::SessionId;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use commands::{check_url, mirror, pull, push_snapshot, BatchSummary, MirrorSummary};
pub use scene::{load_scene, save_scene, scene_from_snapshot, snapshot_of};

/// Agent configuration file.
///
/// ```toml
/// root_name = "game"
///
/// [sync]
/// remote_url = "https://demo-default-rtdb.firebaseio.com"
/// project_id = "demo"
///
/// [sync.timing]
/// settle_ms = 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Root name used for scenes that do not name one.
    pub root_name: String,
    pub sync: SyncSettings,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            root_name: "game".to_string(),
            sync: SyncSettings::default(),
        }
    }
}

impl AgentConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid agent config")
    }

    /// Reads `path`, or returns the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    /// Builds the remote store for these settings.
    pub fn open_store(&self, session: SessionId) -> Result<FirebaseStore> {
        FirebaseStore::from_settings(&self.sync, session)
            .context("remote store is not configured")
    }
}
