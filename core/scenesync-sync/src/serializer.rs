//! Entity serialization into wire records.
//!
//! Four shapes are produced:
//! - **full**: every property, attribute and tag, recursing into children
//!   up to `max_depth` (a stub record marks where descent stopped)
//! - **property/attribute delta**: identity plus the one changed field
//! - **light**: identity plus a fixed set of essential properties
//! - **refresh**: identity plus the current values of a given field set,
//!   used when a pending change is re-captured
//!
//! A property that fails to read is omitted from its record; a value with no
//! documented wire layout is sent in its string form. Neither aborts the
//! record.
//!
//! Full serialization normalizes the quality attribute on the live entity
//! (initialize, clamp, or reset). It is the only write this module makes.

use crate::filter::CategoryFilter;
use scenesync_model::SceneTree;
use scenesync_types::{EntityPath, NodeId, SerializedRecord, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Serializer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Deepest level that is serialized in full; deeper nodes become stubs.
    pub max_depth: usize,
    /// Properties carried by light records.
    pub essential_properties: Vec<String>,
    /// Properties never serialized.
    pub skipped_properties: Vec<String>,
    pub quality: QualityRule,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            essential_properties: [
                "CFrame",
                "Position",
                "Size",
                "Color",
                "Transparency",
                "Anchored",
                "Material",
                "Shape",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            skipped_properties: vec!["Parent".to_string(), "Archivable".to_string()],
            quality: QualityRule::default(),
        }
    }
}

/// Range rule for the numeric quality attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityRule {
    /// Attribute name; empty disables normalization.
    pub attribute: String,
    pub min: f64,
    pub max: f64,
    pub default: f64,
}

impl Default for QualityRule {
    fn default() -> Self {
        Self {
            attribute: "Quality".to_string(),
            min: 0.0,
            max: 10.0,
            default: 5.0,
        }
    }
}

/// Names one changed field of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef<'a> {
    Property(&'a str),
    Attribute(&'a str),
}

/// Serializes live entities read through a [`SceneTree`].
pub struct Serializer<'a> {
    tree: &'a dyn SceneTree,
    filter: &'a CategoryFilter,
    config: &'a SerializerConfig,
}

impl<'a> Serializer<'a> {
    pub fn new(
        tree: &'a dyn SceneTree,
        filter: &'a CategoryFilter,
        config: &'a SerializerConfig,
    ) -> Self {
        Self {
            tree,
            filter,
            config,
        }
    }

    /// Serializes `node` and its subtree.
    ///
    /// Returns `None` for dead nodes and for nodes the filter rejects, except
    /// direct children of the root, which are always kept so the top-level
    /// structure survives.
    pub fn serialize_full(&self, node: NodeId, depth: usize) -> Option<SerializedRecord> {
        if !self.passes_filter(node) {
            return None;
        }
        let mut record = self.identity(node)?;
        let path = self.tree.full_path(node).ok()?;

        if depth >= self.config.max_depth {
            debug!("Depth bound reached at {} (depth {}); emitting stub", path, depth);
            record.truncated = true;
            return Some(record);
        }

        if !self.is_root_child(node) {
            self.normalize_quality(node, &path);
        }

        let skipped: BTreeSet<&str> = self
            .config
            .skipped_properties
            .iter()
            .map(String::as_str)
            .collect();
        for property in self.tree.property_names(node) {
            if skipped.contains(property.as_str()) {
                continue;
            }
            self.read_property(node, &path, &property, &mut record.properties);
        }
        for (attribute, value) in self.tree.attributes(node) {
            let encoded = self.encode(&path, &attribute, &value);
            record.attributes.insert(attribute, encoded);
        }
        record.tags = self.tree.tags(node);

        let children = self
            .tree
            .children(node)
            .into_iter()
            .filter_map(|child| self.serialize_full(child, depth + 1))
            .collect();
        record.children = Some(children);

        Some(record)
    }

    /// Identity plus the single changed property.
    pub fn serialize_property_delta(&self, node: NodeId, property: &str) -> Option<SerializedRecord> {
        let mut record = self.identity(node)?;
        let path = self.tree.full_path(node).ok()?;
        self.read_property(node, &path, property, &mut record.properties);
        Some(record)
    }

    /// Identity plus the single changed attribute. A removed attribute is
    /// sent as the removal marker.
    pub fn serialize_attribute_delta(
        &self,
        node: NodeId,
        attribute: &str,
    ) -> Option<SerializedRecord> {
        let mut record = self.identity(node)?;
        let path = self.tree.full_path(node).ok()?;
        let encoded = match self.tree.get_attribute(node, attribute) {
            Some(value) => self.encode(&path, attribute, &value),
            None => Value::removal(),
        };
        record.attributes.insert(attribute.to_string(), encoded);
        Some(record)
    }

    /// Identity, tags, and whichever essential properties the node has.
    /// Does not descend into children.
    pub fn serialize_light(&self, node: NodeId) -> Option<SerializedRecord> {
        let mut record = self.identity(node)?;
        let path = self.tree.full_path(node).ok()?;
        let available: BTreeSet<String> = self.tree.property_names(node).into_iter().collect();
        for property in &self.config.essential_properties {
            if available.contains(property) {
                self.read_property(node, &path, property, &mut record.properties);
            }
        }
        record.tags = self.tree.tags(node);
        Some(record)
    }

    /// Re-reads every field `previous` carries, plus `changed`, from the
    /// live node. A previous subtree record is re-serialized in full.
    pub fn refresh(
        &self,
        node: NodeId,
        previous: &SerializedRecord,
        changed: Option<FieldRef<'_>>,
    ) -> Option<SerializedRecord> {
        if previous.children.is_some() {
            return self.serialize_full(node, 0);
        }

        let mut properties: BTreeSet<&str> =
            previous.properties.keys().map(String::as_str).collect();
        let mut attributes: BTreeSet<&str> =
            previous.attributes.keys().map(String::as_str).collect();
        match changed {
            Some(FieldRef::Property(name)) => {
                properties.insert(name);
            }
            Some(FieldRef::Attribute(name)) => {
                attributes.insert(name);
            }
            None => {}
        }

        let mut record = self.identity(node)?;
        let path = self.tree.full_path(node).ok()?;
        for property in properties {
            self.read_property(node, &path, property, &mut record.properties);
        }
        for attribute in attributes {
            let encoded = match self.tree.get_attribute(node, attribute) {
                Some(value) => self.encode(&path, attribute, &value),
                None => Value::removal(),
            };
            record.attributes.insert(attribute.to_string(), encoded);
        }
        if !previous.tags.is_empty() {
            record.tags = self.tree.tags(node);
        }
        Some(record)
    }

    /// Full records for every direct child of the root, keyed by name.
    pub fn serialize_services(&self) -> BTreeMap<String, SerializedRecord> {
        let root = self.tree.root();
        self.tree
            .children(root)
            .into_iter()
            .filter_map(|child| self.serialize_full(child, 0))
            .map(|record| (record.name.clone(), record))
            .collect()
    }

    /// True if the node passes the filter or sits directly under the root.
    pub fn passes_filter(&self, node: NodeId) -> bool {
        if !self.tree.is_alive(node) {
            return false;
        }
        if self.is_root_child(node) {
            return true;
        }
        let Ok(class_name) = self.tree.class_name(node) else {
            return false;
        };
        self.filter.should_sync(&class_name, &self.tree.tags(node))
    }

    fn is_root_child(&self, node: NodeId) -> bool {
        self.tree.parent(node) == Some(self.tree.root())
    }

    fn identity(&self, node: NodeId) -> Option<SerializedRecord> {
        let name = self.tree.name(node).ok()?;
        let class_name = self.tree.class_name(node).ok()?;
        let path = self.tree.full_path(node).ok()?;
        let parent_path = path.parent().map(|p| p.to_string());
        Some(SerializedRecord::identity(
            name,
            class_name,
            path.to_string(),
            parent_path,
        ))
    }

    fn read_property(
        &self,
        node: NodeId,
        path: &EntityPath,
        property: &str,
        into: &mut BTreeMap<String, serde_json::Value>,
    ) {
        match self.tree.get_property(node, property) {
            Ok(value) => {
                let encoded = self.encode(path, property, &value);
                into.insert(property.to_string(), encoded);
            }
            Err(e) => debug!("Omitting {}.{}: {}", path, property, e),
        }
    }

    fn encode(&self, path: &EntityPath, field: &str, value: &Value) -> serde_json::Value {
        if !value.is_documented() {
            warn!(
                "No wire layout for {} value at {}.{}; sending string form",
                value.type_name(),
                path,
                field
            );
        }
        value.encode()
    }

    fn normalize_quality(&self, node: NodeId, path: &EntityPath) {
        let rule = &self.config.quality;
        if rule.attribute.is_empty() {
            return;
        }

        let normalized = match self.tree.get_attribute(node, &rule.attribute) {
            None => Some(rule.default),
            Some(Value::Number(n)) if n.is_nan() => {
                warn!("{} on {} is NaN; resetting to {}", rule.attribute, path, rule.default);
                Some(rule.default)
            }
            Some(Value::Number(n)) if n < rule.min || n > rule.max => {
                let clamped = n.clamp(rule.min, rule.max);
                debug!("Clamping {} on {} from {} to {}", rule.attribute, path, n, clamped);
                Some(clamped)
            }
            Some(Value::Number(_)) => None,
            Some(other) => {
                warn!(
                    "{} on {} holds a {} instead of a number; resetting to {}",
                    rule.attribute,
                    path,
                    other.type_name(),
                    rule.default
                );
                Some(rule.default)
            }
        };

        if let Some(value) = normalized
            && let Err(e) = self
                .tree
                .set_attribute(node, &rule.attribute, Some(Value::Number(value)))
        {
            warn!("Failed to write {} on {}: {}", rule.attribute, path, e);
        }
    }
}
