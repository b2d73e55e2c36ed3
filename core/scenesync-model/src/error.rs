//! Error types for host tree access.

use scenesync_types::NodeId;
use thiserror::Error;

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

/// Errors reported by a host tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The node was destroyed or never existed.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// The property does not exist on this node.
    #[error("unknown property {property} on {node}")]
    UnknownProperty { node: NodeId, property: String },

    /// The property exists but cannot be written.
    #[error("property {0} is read-only")]
    ReadOnly(String),

    /// The value has the wrong type for the property.
    #[error("type mismatch for {property}: {message}")]
    TypeMismatch { property: String, message: String },

    /// The host refused the operation.
    #[error("host rejected operation: {0}")]
    Rejected(String),
}
