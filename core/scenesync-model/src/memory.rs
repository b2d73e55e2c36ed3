//! In-memory scene tree.
//!
//! A complete [`SceneTree`] host backed by a node map. Listeners are called
//! synchronously after each mutation, once the internal lock is released,
//! so a listener may read the tree.

use crate::{SceneTree, TreeError, TreeEvent, TreeListener, TreeResult};
use scenesync_types::{EntityPath, NodeId, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

const ROOT_CLASS: &str = "DataModel";

#[derive(Debug, Clone)]
struct Node {
    class_name: String,
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: BTreeMap<String, Value>,
    attributes: BTreeMap<String, Value>,
    tags: Vec<String>,
}

impl Node {
    fn new(class_name: &str, name: &str, parent: Option<NodeId>) -> Self {
        Self {
            class_name: class_name.to_string(),
            name: name.to_string(),
            parent,
            children: Vec::new(),
            properties: BTreeMap::new(),
            attributes: BTreeMap::new(),
            tags: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_id: u64,
}

impl Inner {
    fn node(&self, id: NodeId) -> TreeResult<&Node> {
        self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> TreeResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(TreeError::NodeNotFound(id))
    }

    fn path_of(&self, id: NodeId) -> TreeResult<EntityPath> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            segments.push(node.name.clone());
            current = node.parent;
        }
        segments.reverse();
        Ok(EntityPath::new(segments))
    }

    /// The node followed by its descendants, parents before children.
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(&next) {
                out.push(next);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }
}

/// An in-memory host tree.
pub struct MemoryTree {
    inner: RwLock<Inner>,
    listeners: RwLock<Vec<TreeListener>>,
}

impl std::fmt::Debug for MemoryTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTree")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl MemoryTree {
    /// Creates a tree holding only a root node named `root_name`.
    pub fn new(root_name: &str) -> Self {
        let root = NodeId::from_raw(1);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new(ROOT_CLASS, root_name, None));
        Self {
            inner: RwLock::new(Inner {
                nodes,
                root,
                next_id: 2,
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Creates a tree with one child of the root per `(class, name)` pair.
    pub fn with_services(root_name: &str, services: &[(&str, &str)]) -> Self {
        let tree = Self::new(root_name);
        {
            let mut inner = tree.write();
            let root = inner.root;
            for (class_name, name) in services {
                let id = NodeId::from_raw(inner.next_id);
                inner.next_id += 1;
                inner.nodes.insert(id, Node::new(class_name, name, Some(root)));
                if let Some(root_node) = inner.nodes.get_mut(&root) {
                    root_node.children.push(id);
                }
            }
        }
        tree
    }

    /// Number of live nodes, including the root.
    pub fn len(&self) -> usize {
        self.read().nodes.len()
    }

    /// True if only the root remains.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Raises a selection-changed notification.
    pub fn select(&self, selection: Vec<NodeId>) {
        self.emit(&[TreeEvent::SelectionChanged { selection }]);
    }

    /// Raises an undo notification.
    pub fn undo(&self, waypoint: &str, node: Option<NodeId>) {
        self.emit(&[TreeEvent::Undo {
            waypoint: waypoint.to_string(),
            node,
        }]);
    }

    /// Raises a redo notification.
    pub fn redo(&self, waypoint: &str, node: Option<NodeId>) {
        self.emit(&[TreeEvent::Redo {
            waypoint: waypoint.to_string(),
            node,
        }]);
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, events: &[TreeEvent]) {
        let listeners: Vec<TreeListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for event in events {
            for listener in &listeners {
                listener(event);
            }
        }
    }
}

impl SceneTree for MemoryTree {
    fn root(&self) -> NodeId {
        self.read().root
    }

    fn is_alive(&self, node: NodeId) -> bool {
        self.read().nodes.contains_key(&node)
    }

    fn class_name(&self, node: NodeId) -> TreeResult<String> {
        Ok(self.read().node(node)?.class_name.clone())
    }

    fn name(&self, node: NodeId) -> TreeResult<String> {
        Ok(self.read().node(node)?.name.clone())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.read().nodes.get(&node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.read()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn property_names(&self, node: NodeId) -> Vec<String> {
        self.read()
            .nodes
            .get(&node)
            .map(|n| n.properties.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn get_property(&self, node: NodeId, property: &str) -> TreeResult<Value> {
        let inner = self.read();
        let data = inner.node(node)?;
        match property {
            "Name" => Ok(Value::String(data.name.clone())),
            "ClassName" => Ok(Value::String(data.class_name.clone())),
            _ => data
                .properties
                .get(property)
                .cloned()
                .ok_or_else(|| TreeError::UnknownProperty {
                    node,
                    property: property.to_string(),
                }),
        }
    }

    fn set_property(&self, node: NodeId, property: &str, value: Value) -> TreeResult<()> {
        {
            let mut inner = self.write();
            let data = inner.node_mut(node)?;
            match property {
                "ClassName" => return Err(TreeError::ReadOnly(property.to_string())),
                "Name" => match value {
                    Value::String(name) if !name.is_empty() => data.name = name,
                    other => {
                        return Err(TreeError::TypeMismatch {
                            property: property.to_string(),
                            message: format!("expected a non-empty String, got {}", other.type_name()),
                        });
                    }
                },
                _ => {
                    if let Some(existing) = data.properties.get(property)
                        && existing.type_name() != value.type_name()
                    {
                        return Err(TreeError::TypeMismatch {
                            property: property.to_string(),
                            message: format!(
                                "expected {}, got {}",
                                existing.type_name(),
                                value.type_name()
                            ),
                        });
                    }
                    data.properties.insert(property.to_string(), value);
                }
            }
        }
        self.emit(&[TreeEvent::PropertyChanged {
            node,
            property: property.to_string(),
        }]);
        Ok(())
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, Value)> {
        self.read()
            .nodes
            .get(&node)
            .map(|n| {
                n.attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_attribute(&self, node: NodeId, attribute: &str) -> Option<Value> {
        self.read()
            .nodes
            .get(&node)
            .and_then(|n| n.attributes.get(attribute).cloned())
    }

    fn set_attribute(
        &self,
        node: NodeId,
        attribute: &str,
        value: Option<Value>,
    ) -> TreeResult<()> {
        {
            let mut inner = self.write();
            let data = inner.node_mut(node)?;
            match value {
                Some(v) => {
                    data.attributes.insert(attribute.to_string(), v);
                }
                None => {
                    data.attributes.remove(attribute);
                }
            }
        }
        self.emit(&[TreeEvent::AttributeChanged {
            node,
            attribute: attribute.to_string(),
        }]);
        Ok(())
    }

    fn tags(&self, node: NodeId) -> Vec<String> {
        self.read()
            .nodes
            .get(&node)
            .map(|n| n.tags.clone())
            .unwrap_or_default()
    }

    fn set_tags(&self, node: NodeId, tags: &[String]) -> TreeResult<()> {
        let mut inner = self.write();
        let data = inner.node_mut(node)?;
        data.tags = tags.to_vec();
        Ok(())
    }

    fn create(&self, parent: NodeId, class_name: &str, name: &str) -> TreeResult<NodeId> {
        if class_name.is_empty() || name.is_empty() {
            return Err(TreeError::Rejected(
                "class name and name must be non-empty".to_string(),
            ));
        }
        let id = {
            let mut inner = self.write();
            inner.node(parent)?;
            let id = NodeId::from_raw(inner.next_id);
            inner.next_id += 1;
            inner.nodes.insert(id, Node::new(class_name, name, Some(parent)));
            inner.node_mut(parent)?.children.push(id);
            id
        };
        self.emit(&[TreeEvent::DescendantAdded { node: id }]);
        Ok(id)
    }

    fn destroy(&self, node: NodeId) -> TreeResult<()> {
        let events = {
            let mut inner = self.write();
            if node == inner.root {
                return Err(TreeError::Rejected("cannot destroy the root".to_string()));
            }
            let parent = inner.node(node)?.parent;
            let doomed = inner.subtree(node);
            let mut events = Vec::with_capacity(doomed.len());
            for id in &doomed {
                let doomed_node = inner.node(*id)?;
                events.push(TreeEvent::DescendantRemoving {
                    node: *id,
                    path: inner.path_of(*id)?,
                    class_name: doomed_node.class_name.clone(),
                    tags: doomed_node.tags.clone(),
                });
            }
            for id in &doomed {
                inner.nodes.remove(id);
            }
            if let Some(parent_id) = parent
                && let Some(parent_node) = inner.nodes.get_mut(&parent_id)
            {
                parent_node.children.retain(|c| *c != node);
            }
            events
        };
        self.emit(&events);
        Ok(())
    }

    fn subscribe(&self, listener: TreeListener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}
