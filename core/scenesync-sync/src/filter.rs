//! Category filter: decides whether an entity type participates in sync.
//!
//! Categories are named groups of class names with an enabled flag. The
//! filter precomputes, once per settings snapshot, a table from class name
//! to the categories that cover it (directly or through a known supertype),
//! so a decision is a handful of hash lookups.
//!
//! Rules apply in a fixed order; the first rule that decides wins:
//! 1. Abstract tag: the entity carries the abstract tag and its class is in
//!    the enabled abstract category.
//! 2. Dual gate: designated classes need both gate categories enabled.
//! 3. Membership: allowed if any category listing the class is enabled,
//!    denied if all of them are disabled.
//! 4. Supertype: same as 3, using the nearest registered supertype.
//! 5. Catch-all: the catch-all category's flag.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A named group of classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub classes: Vec<String>,
}

impl Category {
    pub fn new(name: &str, enabled: bool, classes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            enabled,
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Classes that belong to two categories at once and sync only when both
/// are enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualGate {
    pub classes: Vec<String>,
    pub requires: [String; 2],
}

/// Static filter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub categories: Vec<Category>,
    /// Tag that routes an entity through `abstract_category`.
    pub abstract_tag: String,
    pub abstract_category: String,
    pub dual_gate: DualGate,
    /// Category whose flag decides classes no other rule covers.
    pub catch_all: String,
    /// Class name to direct superclass name.
    pub superclasses: BTreeMap<String, String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let categories = vec![
            Category::new(
                "Parts",
                true,
                &[
                    "BasePart", "Part", "MeshPart", "WedgePart", "CornerWedgePart", "TrussPart",
                    "UnionOperation", "SpawnLocation", "Seat",
                ],
            ),
            Category::new("Models", true, &["Model"]),
            Category::new(
                "Scripts",
                true,
                &["LuaSourceContainer", "Script", "LocalScript", "ModuleScript"],
            ),
            Category::new(
                "Lighting",
                true,
                &[
                    "Lighting", "Atmosphere", "Sky", "Light", "PointLight", "SpotLight",
                    "SurfaceLight", "PostEffect", "BloomEffect", "ColorCorrectionEffect",
                ],
            ),
            Category::new(
                "Gui",
                true,
                &[
                    "GuiObject", "ScreenGui", "Frame", "TextLabel", "TextButton", "ImageLabel",
                    "ImageButton", "ScrollingFrame", "UICorner",
                ],
            ),
            Category::new(
                "Effects",
                true,
                &["ParticleEmitter", "Beam", "Trail", "Fire", "Smoke", "Sparkles", "Attachment"],
            ),
            Category::new("Audio", true, &["Sound", "SoundGroup"]),
            Category::new("Terrain", false, &["Terrain"]),
            Category::new(
                "Abstract",
                true,
                &[
                    "Folder", "Configuration", "ValueBase", "StringValue", "NumberValue",
                    "BoolValue", "IntValue", "ObjectValue", "Vector3Value",
                ],
            ),
            Category::new("Other", true, &[]),
        ];

        let superclasses = [
            ("VehicleSeat", "BasePart"),
            ("PartOperation", "BasePart"),
            ("NegateOperation", "PartOperation"),
            ("TextBox", "GuiObject"),
            ("VideoFrame", "GuiObject"),
            ("ViewportFrame", "GuiObject"),
            ("CoreScript", "LuaSourceContainer"),
            ("Color3Value", "ValueBase"),
            ("CFrameValue", "ValueBase"),
            ("RayValue", "ValueBase"),
            ("BlurEffect", "PostEffect"),
            ("SunRaysEffect", "PostEffect"),
            ("DepthOfFieldEffect", "PostEffect"),
        ]
        .into_iter()
        .map(|(c, s)| (c.to_string(), s.to_string()))
        .collect();

        Self {
            categories,
            abstract_tag: "Abstract".to_string(),
            abstract_category: "Abstract".to_string(),
            dual_gate: DualGate {
                classes: vec!["SurfaceGui".to_string(), "BillboardGui".to_string()],
                requires: ["Gui".to_string(), "Parts".to_string()],
            },
            catch_all: "Other".to_string(),
            superclasses,
        }
    }
}

impl FilterConfig {
    /// Flips a category's flag. Returns false if the category is unknown.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.categories.iter_mut().find(|c| c.name == name) {
            Some(category) => {
                category.enabled = enabled;
                true
            }
            None => false,
        }
    }
}

/// Which rule produced a filter decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRule {
    AbstractTag,
    DualGate,
    Membership,
    Supertype,
    CatchAll,
}

/// Outcome of a filter lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterDecision {
    pub allowed: bool,
    pub rule: FilterRule,
}

/// Precomputed filter built from one [`FilterConfig`] snapshot.
#[derive(Debug, Clone)]
pub struct CategoryFilter {
    names: Vec<String>,
    enabled: Vec<bool>,
    /// Class to every category listing it, in registration order.
    membership: HashMap<String, Vec<usize>>,
    /// Unlisted class to the categories of its nearest listed supertype.
    inherited: HashMap<String, Vec<usize>>,
    dual_gated: HashSet<String>,
    dual_gate: (Option<usize>, Option<usize>),
    abstract_tag: String,
    abstract_category: Option<usize>,
    catch_all: Option<usize>,
}

impl CategoryFilter {
    pub fn new(config: &FilterConfig) -> Self {
        let names: Vec<String> = config.categories.iter().map(|c| c.name.clone()).collect();
        let enabled = config.categories.iter().map(|c| c.enabled).collect();
        let index_of = |name: &str| names.iter().position(|n| n == name);

        let mut membership: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, category) in config.categories.iter().enumerate() {
            for class in &category.classes {
                let owners = membership.entry(class.clone()).or_default();
                if !owners.contains(&idx) {
                    owners.push(idx);
                }
            }
        }

        let mut inherited = HashMap::new();
        for class in config.superclasses.keys() {
            if membership.contains_key(class) {
                continue;
            }
            let mut seen = HashSet::from([class.as_str()]);
            let mut current = config.superclasses.get(class);
            while let Some(superclass) = current {
                if !seen.insert(superclass.as_str()) {
                    break;
                }
                if let Some(owners) = membership.get(superclass) {
                    inherited.insert(class.clone(), owners.clone());
                    break;
                }
                current = config.superclasses.get(superclass);
            }
        }

        Self {
            dual_gate: (
                index_of(&config.dual_gate.requires[0]),
                index_of(&config.dual_gate.requires[1]),
            ),
            dual_gated: config.dual_gate.classes.iter().cloned().collect(),
            abstract_tag: config.abstract_tag.clone(),
            abstract_category: index_of(&config.abstract_category),
            catch_all: index_of(&config.catch_all),
            names,
            enabled,
            membership,
            inherited,
        }
    }

    /// True if an entity of `class_name` carrying `tags` should sync.
    pub fn should_sync(&self, class_name: &str, tags: &[String]) -> bool {
        self.decide(class_name, tags).allowed
    }

    /// Full decision, including the rule that made it.
    pub fn decide(&self, class_name: &str, tags: &[String]) -> FilterDecision {
        if tags.iter().any(|t| *t == self.abstract_tag)
            && let Some(idx) = self.abstract_category
            && self.enabled[idx]
            && self
                .membership
                .get(class_name)
                .is_some_and(|owners| owners.contains(&idx))
        {
            return FilterDecision {
                allowed: true,
                rule: FilterRule::AbstractTag,
            };
        }

        if self.dual_gated.contains(class_name) {
            let on = |idx: Option<usize>| idx.is_some_and(|i| self.enabled[i]);
            return FilterDecision {
                allowed: on(self.dual_gate.0) && on(self.dual_gate.1),
                rule: FilterRule::DualGate,
            };
        }

        if let Some(owners) = self.membership.get(class_name) {
            return FilterDecision {
                allowed: owners.iter().any(|i| self.enabled[*i]),
                rule: FilterRule::Membership,
            };
        }

        if let Some(owners) = self.inherited.get(class_name) {
            return FilterDecision {
                allowed: owners.iter().any(|i| self.enabled[*i]),
                rule: FilterRule::Supertype,
            };
        }

        FilterDecision {
            allowed: self.catch_all.is_some_and(|i| self.enabled[i]),
            rule: FilterRule::CatchAll,
        }
    }

    /// The first-registered category listing `class_name`.
    pub fn owning_category(&self, class_name: &str) -> Option<&str> {
        self.membership
            .get(class_name)
            .or_else(|| self.inherited.get(class_name))
            .and_then(|owners| owners.first())
            .map(|i| self.names[*i].as_str())
    }
}

impl Default for CategoryFilter {
    fn default() -> Self {
        Self::new(&FilterConfig::default())
    }
}
