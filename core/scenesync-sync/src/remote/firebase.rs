//! Firebase Realtime Database store over its REST interface.
//!
//! Layout under the base URL:
//! - `projects/{project}/changes/{key}.json`: one batch envelope per key
//! - `projects/{project}/datamodel.json`: the latest snapshot envelope

use super::store::{PullOutcome, RemoteStore};
use crate::error::{SyncError, SyncResult};
use crate::protocol::{Batch, InboundEnvelope, RemoteBatch, SnapshotEnvelope};
use crate::settings::{RemoteEndpoint, SyncSettings};
use async_trait::async_trait;
use reqwest::{Client, Response};
use scenesync_types::{SessionId, Timestamp};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Firebase Realtime Database gateway for one project.
pub struct FirebaseStore {
    client: Client,
    endpoint: RemoteEndpoint,
    project_id: String,
    session: SessionId,
    /// Last batch key issued; keys are strictly increasing.
    last_key: AtomicU64,
}

impl FirebaseStore {
    /// Creates a store for a validated endpoint.
    pub fn new(
        endpoint: RemoteEndpoint,
        project_id: impl Into<String>,
        session: SessionId,
        timeout: Duration,
    ) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            project_id: project_id.into(),
            session,
            last_key: AtomicU64::new(0),
        })
    }

    /// Validates `settings` and builds a store from them.
    pub fn from_settings(settings: &SyncSettings, session: SessionId) -> SyncResult<Self> {
        let endpoint = settings.remote_endpoint()?;
        Self::new(
            endpoint,
            settings.project_id.clone(),
            session,
            settings.timing.http_timeout(),
        )
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Issues the next batch key: the current time, or one past the last
    /// key if the clock has not moved past it.
    pub fn next_key(&self, now: Timestamp) -> Timestamp {
        let wanted = now.as_millis();
        let previous = self
            .last_key
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wanted.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        Timestamp::from_millis(wanted.max(previous + 1))
    }

    fn project_url(&self, leaf: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.endpoint.as_str(),
            self.project_id,
            leaf
        )
    }

    async fn check(response: Response) -> SyncResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::from_status(status.as_u16(), body))
    }
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    fn provider_name(&self) -> &'static str {
        "firebase"
    }

    async fn push_batch(&self, batch: &Batch) -> SyncResult<Timestamp> {
        let key = self.next_key(Timestamp::now());
        let envelope = batch.envelope(&self.project_id, self.session);
        let url = self.project_url(&format!("changes/{key}.json"));

        let response = self.client.put(&url).json(&envelope).send().await?;
        Self::check(response).await?;

        debug!("Pushed batch {} ({} changes) under key {}", batch.id, batch.len(), key);
        Ok(key)
    }

    async fn push_snapshot(&self, snapshot: &SnapshotEnvelope) -> SyncResult<()> {
        let url = self.project_url("datamodel.json");

        let response = self.client.put(&url).json(snapshot).send().await?;
        Self::check(response).await?;

        debug!("Pushed snapshot with {} services", snapshot.services.len());
        Ok(())
    }

    async fn pull_recent(&self, limit: usize) -> SyncResult<PullOutcome> {
        if limit == 0 {
            return Ok(PullOutcome::Disabled);
        }

        let url = self.project_url("changes.json");
        let limit = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[("orderBy", "\"$key\""), ("limitToLast", limit.as_str())])
            .send()
            .await?;
        let response = Self::check(response).await?;
        let body = response.text().await?;

        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| SyncError::Decode(format!("changes listing is not JSON: {e}")))?;
        let listing = match value {
            serde_json::Value::Null => return Ok(PullOutcome::NothingNew),
            serde_json::Value::Object(listing) => listing,
            other => {
                return Err(SyncError::Decode(format!(
                    "expected an object of batches, found {}",
                    json_kind(&other)
                )));
            }
        };

        let mut batches = Vec::with_capacity(listing.len());
        for (raw_key, raw_envelope) in listing {
            let Ok(key) = raw_key.parse::<Timestamp>() else {
                warn!("Skipping remote batch with non-numeric key {:?}", raw_key);
                continue;
            };
            match serde_json::from_value::<InboundEnvelope>(raw_envelope) {
                Ok(envelope) => batches.push(RemoteBatch::decode(key, envelope)),
                Err(e) => warn!("Skipping undecodable remote batch {}: {}", key, e),
            }
        }
        batches.sort_by_key(|batch| batch.key);

        if batches.is_empty() {
            return Ok(PullOutcome::NothingNew);
        }
        Ok(PullOutcome::Batches(batches))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
