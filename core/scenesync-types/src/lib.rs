//! Core type definitions for scenesync.
//!
//! This crate defines the leaf types shared by every other crate:
//! - Entity paths (the identity key of a node) and host node handles
//! - Millisecond wall-clock timestamps
//! - The typed value table and its fixed wire layout
//! - Serialized records and pending change records
//!
//! Nothing here talks to the host tree or the network.

mod ids;
mod record;
mod timestamp;
mod value;

pub use ids::{EntityPath, NodeId, SessionId, PATH_SEPARATOR};
pub use record::{ChangeAction, ChangeRecord, ChangeType, SerializedRecord};
pub use timestamp::Timestamp;
pub use value::{
    CFrame, Color3, ColorSequence, ColorSequenceKeypoint, EnumItem, Font, NumberRange,
    NumberSequence, NumberSequenceKeypoint, PhysicalProperties, Ray, Rect, Region3, UDim, UDim2,
    Value, Vector2, Vector3, REMOVED_TYPE,
};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}
