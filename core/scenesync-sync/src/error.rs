//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// None of these are fatal to the host: callers log them and retry on the
/// next tick or pull.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote endpoint missing or invalid. Push and pull stay disabled until
    /// the configuration is corrected.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP failure, timeout, or non-success status.
    #[error("transport error ({hint}): {message}")]
    Transport {
        status: Option<u16>,
        hint: TransportHint,
        message: String,
    },

    /// Malformed data from the remote store.
    #[error("decode error: {0}")]
    Decode(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Host tree rejected an operation.
    #[error("tree error: {0}")]
    Tree(#[from] scenesync_model::TreeError),

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,
}

impl SyncError {
    /// Builds a transport error from an HTTP status code.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        SyncError::Transport {
            status: Some(status),
            hint: TransportHint::from_status(status),
            message: body.into(),
        }
    }

    /// True for failures the next tick may succeed on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport { .. } | SyncError::Decode(_))
    }

    /// The transport hint, if this is a transport error.
    pub fn hint(&self) -> Option<TransportHint> {
        match self {
            SyncError::Transport { hint, .. } => Some(*hint),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        let hint = if e.is_timeout() {
            TransportHint::Timeout
        } else if e.is_connect() {
            TransportHint::HttpDisabled
        } else if let Some(code) = status {
            TransportHint::from_status(code)
        } else {
            TransportHint::Other
        };
        SyncError::Transport {
            status,
            hint,
            message: e.to_string(),
        }
    }
}

/// Classified cause of a transport failure, logged alongside the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportHint {
    /// 403: the store's access rules refuse the request.
    Forbidden,
    /// 401: credentials missing or rejected.
    Unauthorized,
    /// 404: wrong base URL or project.
    NotFound,
    /// No connection could be made; outbound HTTP is unavailable.
    HttpDisabled,
    Timeout,
    /// 5xx from the store.
    Server,
    Other,
}

impl TransportHint {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => TransportHint::Unauthorized,
            403 => TransportHint::Forbidden,
            404 => TransportHint::NotFound,
            408 => TransportHint::Timeout,
            500..=599 => TransportHint::Server,
            _ => TransportHint::Other,
        }
    }
}

impl std::fmt::Display for TransportHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TransportHint::Forbidden => "forbidden: check the database rules",
            TransportHint::Unauthorized => "unauthorized: check credentials",
            TransportHint::NotFound => "not found: check the base URL and project id",
            TransportHint::HttpDisabled => "http disabled: outbound requests are not possible",
            TransportHint::Timeout => "timed out",
            TransportHint::Server => "remote store error",
            TransportHint::Other => "request failed",
        })
    }
}
