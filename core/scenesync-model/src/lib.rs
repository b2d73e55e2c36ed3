//! Host scene-tree model for scenesync.
//!
//! The live tree belongs to the host environment. The sync core reaches it
//! only through the narrow capability interface defined here:
//! - [`SceneTree`]: read/write access to nodes, properties, attributes, tags
//! - [`TreeEvent`]: mutation notifications delivered to subscribers
//! - [`MemoryTree`]: a self-contained in-memory host, used by the agent
//!   binary and by tests

mod error;
mod event;
mod memory;
mod tree;

pub use error::{TreeError, TreeResult};
pub use event::{TreeEvent, TreeListener};
pub use memory::MemoryTree;
pub use tree::SceneTree;
