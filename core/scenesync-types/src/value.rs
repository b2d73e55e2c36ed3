//! Typed property and attribute values.
//!
//! Every documented value type has a fixed, flat wire layout of named
//! numeric (or string) fields. The layout is the wire contract: a value
//! encoded with [`Value::encode`] decodes back to an equal value with
//! [`Value::decode`].
//!
//! Wire form is adjacently tagged:
//!
//! ```json
//! {"Type": "Vector3", "Value": {"X": 1.0, "Y": 2.0, "Z": 3.0}}
//! ```
//!
//! Values the host cannot express in the table are carried as
//! [`Value::Opaque`] and degrade to their string form on the wire.

use serde::{Deserialize, Serialize};

/// `Type` tag of the removed-attribute marker.
pub const REMOVED_TYPE: &str = "Removed";

/// A typed value read from or written to a host property or attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type", content = "Value")]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
    Vector2(Vector2),
    Vector3(Vector3),
    Color3(Color3),
    CFrame(CFrame),
    UDim(UDim),
    UDim2(UDim2),
    Enum(EnumItem),
    NumberSequence(NumberSequence),
    ColorSequence(ColorSequence),
    NumberRange(NumberRange),
    PhysicalProperties(PhysicalProperties),
    Ray(Ray),
    Rect(Rect),
    Region3(Region3),
    Font(Font),
    /// A host value with no documented layout.
    #[serde(skip)]
    Opaque {
        /// Host type name, for diagnostics.
        type_name: String,
        /// The host's string rendering of the value.
        display: String,
    },
}

impl Value {
    /// Name of the value's type, as written in the `Type` tag.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Vector2(_) => "Vector2",
            Value::Vector3(_) => "Vector3",
            Value::Color3(_) => "Color3",
            Value::CFrame(_) => "CFrame",
            Value::UDim(_) => "UDim",
            Value::UDim2(_) => "UDim2",
            Value::Enum(_) => "Enum",
            Value::NumberSequence(_) => "NumberSequence",
            Value::ColorSequence(_) => "ColorSequence",
            Value::NumberRange(_) => "NumberRange",
            Value::PhysicalProperties(_) => "PhysicalProperties",
            Value::Ray(_) => "Ray",
            Value::Rect(_) => "Rect",
            Value::Region3(_) => "Region3",
            Value::Font(_) => "Font",
            Value::Opaque { type_name, .. } => type_name,
        }
    }

    /// True if this value has a documented wire layout. Non-finite numbers
    /// have none.
    pub fn is_documented(&self) -> bool {
        match self {
            Value::Opaque { .. } => false,
            Value::Number(n) => n.is_finite(),
            _ => true,
        }
    }

    /// Returns the numeric payload of a `Number`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the payload of a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Encodes the value into its wire form.
    ///
    /// Opaque values and non-finite numbers, which JSON cannot carry, become
    /// a `String` holding their display form.
    pub fn encode(&self) -> serde_json::Value {
        let documented = match self {
            Value::Opaque { display, .. } => Value::String(display.clone()),
            Value::Number(n) if !n.is_finite() => Value::String(n.to_string()),
            other => other.clone(),
        };
        serde_json::to_value(&documented).unwrap_or(serde_json::Value::Null)
    }

    /// Wire form of a removed attribute.
    ///
    /// The remote store deletes keys written as `null`, so a removal travels
    /// as a tagged object of its own.
    pub fn removal() -> serde_json::Value {
        serde_json::json!({ "Type": REMOVED_TYPE })
    }

    /// True if `wire` marks a removed attribute. A bare `null` is accepted
    /// too.
    pub fn is_removal(wire: &serde_json::Value) -> bool {
        wire.is_null() || wire.get("Type").and_then(serde_json::Value::as_str) == Some(REMOVED_TYPE)
    }

    /// Decodes a value from its wire form.
    ///
    /// Bare JSON booleans, numbers and strings are accepted as the
    /// corresponding primitive; anything else must carry a `Type` tag.
    pub fn decode(wire: &serde_json::Value) -> crate::Result<Self> {
        match wire {
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(Value::Number)
                .ok_or_else(|| crate::Error::InvalidValue(format!("unrepresentable number {n}"))),
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Object(_) => Ok(serde_json::from_value(wire.clone())?),
            other => Err(crate::Error::InvalidValue(format!(
                "expected a typed value, got {other}"
            ))),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vector3> for Value {
    fn from(v: Vector3) -> Self {
        Value::Vector3(v)
    }
}

impl From<Color3> for Value {
    fn from(v: Color3) -> Self {
        Value::Color3(v)
    }
}

impl From<CFrame> for Value {
    fn from(v: CFrame) -> Self {
        Value::CFrame(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Color3 {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color3 {
    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

/// Rigid transform: position plus a row-major 3x3 rotation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CFrame {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub r00: f64,
    pub r01: f64,
    pub r02: f64,
    pub r10: f64,
    pub r11: f64,
    pub r12: f64,
    pub r20: f64,
    pub r21: f64,
    pub r22: f64,
}

impl CFrame {
    /// A transform at `position` with identity rotation.
    #[must_use]
    pub const fn at(position: Vector3) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z: position.z,
            r00: 1.0,
            r01: 0.0,
            r02: 0.0,
            r10: 0.0,
            r11: 1.0,
            r12: 0.0,
            r20: 0.0,
            r21: 0.0,
            r22: 1.0,
        }
    }

    /// The translation component.
    #[must_use]
    pub const fn position(&self) -> Vector3 {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl Default for CFrame {
    fn default() -> Self {
        Self::at(Vector3::default())
    }
}

/// One layout dimension: a relative scale plus an absolute pixel offset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UDim {
    pub scale: f64,
    pub offset: i32,
}

/// Two-axis layout dimension, flattened.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UDim2 {
    pub x_scale: f64,
    pub x_offset: i32,
    pub y_scale: f64,
    pub y_offset: i32,
}

/// An enumerated value: the enum's type name, item name and numeric value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnumItem {
    pub enum_type: String,
    pub name: String,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NumberSequenceKeypoint {
    pub time: f64,
    pub value: f64,
    #[serde(default)]
    pub envelope: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NumberSequence {
    #[serde(default)]
    pub keypoints: Vec<NumberSequenceKeypoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColorSequenceKeypoint {
    pub time: f64,
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ColorSequence {
    #[serde(default)]
    pub keypoints: Vec<ColorSequenceKeypoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NumberRange {
    pub min: f64,
    pub max: f64,
}

/// Physical material bundle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhysicalProperties {
    pub density: f64,
    pub friction: f64,
    pub elasticity: f64,
    pub friction_weight: f64,
    pub elasticity_weight: f64,
}

/// Ray geometry, flattened into origin and direction components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ray {
    pub origin_x: f64,
    pub origin_y: f64,
    pub origin_z: f64,
    pub direction_x: f64,
    pub direction_y: f64,
    pub direction_z: f64,
}

/// Axis-aligned 2D region.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// Axis-aligned 3D region.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Region3 {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

/// Font descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Font {
    pub family: String,
    pub weight: u16,
    pub style: String,
}
