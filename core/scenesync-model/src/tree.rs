use crate::{TreeListener, TreeResult};
use scenesync_types::{EntityPath, NodeId, Value};

/// Capability interface onto the host's live tree.
///
/// The sync core never allocates or frees nodes on its own account; it
/// observes through this trait and, when applying remote changes, asks the
/// host to create, write or destroy.
///
/// `Name` and `ClassName` are identity fields. They are readable through
/// [`SceneTree::name`] and [`SceneTree::class_name`] and are not listed by
/// [`SceneTree::property_names`].
pub trait SceneTree: Send + Sync {
    /// The tree root.
    fn root(&self) -> NodeId;

    /// True while the node exists in the tree.
    fn is_alive(&self, node: NodeId) -> bool;

    fn class_name(&self, node: NodeId) -> TreeResult<String>;

    fn name(&self, node: NodeId) -> TreeResult<String>;

    /// Parent of a node; `None` for the root or a dead node.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Children in insertion order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Names of the node's readable properties, in a stable order.
    fn property_names(&self, node: NodeId) -> Vec<String>;

    fn get_property(&self, node: NodeId, property: &str) -> TreeResult<Value>;

    fn set_property(&self, node: NodeId, property: &str, value: Value) -> TreeResult<()>;

    /// All attributes, sorted by name.
    fn attributes(&self, node: NodeId) -> Vec<(String, Value)>;

    fn get_attribute(&self, node: NodeId, attribute: &str) -> Option<Value>;

    /// Sets an attribute; `None` removes it.
    fn set_attribute(&self, node: NodeId, attribute: &str, value: Option<Value>)
    -> TreeResult<()>;

    fn tags(&self, node: NodeId) -> Vec<String>;

    /// Replaces the node's tag set.
    fn set_tags(&self, node: NodeId, tags: &[String]) -> TreeResult<()>;

    /// Creates a node of `class_name` under `parent`.
    fn create(&self, parent: NodeId, class_name: &str, name: &str) -> TreeResult<NodeId>;

    /// Destroys a node and its subtree.
    fn destroy(&self, node: NodeId) -> TreeResult<()>;

    /// Registers a listener for mutation notifications.
    fn subscribe(&self, listener: TreeListener);

    /// Full path from the root, walking parent links.
    fn full_path(&self, node: NodeId) -> TreeResult<EntityPath> {
        let mut segments = vec![self.name(node)?];
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            segments.push(self.name(parent)?);
            current = parent;
        }
        segments.reverse();
        Ok(EntityPath::new(segments))
    }

    /// Resolves a path by walking down from the root by child name.
    /// The first matching sibling wins.
    fn find_by_path(&self, path: &EntityPath) -> Option<NodeId> {
        let (first, rest) = path.segments().split_first()?;
        let root = self.root();
        if self.name(root).ok()? != *first {
            return None;
        }
        let mut current = root;
        for segment in rest {
            current = self
                .children(current)
                .into_iter()
                .find(|child| self.name(*child).is_ok_and(|n| n == *segment))?;
        }
        Some(current)
    }
}
