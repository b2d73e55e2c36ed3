use scenesync_types::{EntityPath, NodeId};
use std::sync::Arc;

/// A mutation notification raised by the host tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    /// A node was inserted somewhere beneath the root.
    DescendantAdded { node: NodeId },
    /// A node is about to be removed. Identity is captured before removal,
    /// since the node cannot be resolved once the event is handled.
    DescendantRemoving {
        node: NodeId,
        path: EntityPath,
        class_name: String,
        tags: Vec<String>,
    },
    PropertyChanged { node: NodeId, property: String },
    AttributeChanged { node: NodeId, attribute: String },
    SelectionChanged { selection: Vec<NodeId> },
    /// An undo was performed. `node` is set only when the host can name the
    /// entity the waypoint touched.
    Undo { waypoint: String, node: Option<NodeId> },
    Redo { waypoint: String, node: Option<NodeId> },
}

impl TreeEvent {
    /// The node this event concerns, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            TreeEvent::DescendantAdded { node }
            | TreeEvent::DescendantRemoving { node, .. }
            | TreeEvent::PropertyChanged { node, .. }
            | TreeEvent::AttributeChanged { node, .. } => Some(*node),
            TreeEvent::Undo { node, .. } | TreeEvent::Redo { node, .. } => *node,
            TreeEvent::SelectionChanged { .. } => None,
        }
    }
}

/// Callback invoked for every tree event, on the thread that caused it.
pub type TreeListener = Arc<dyn Fn(&TreeEvent) + Send + Sync>;
