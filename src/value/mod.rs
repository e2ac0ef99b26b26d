//! Fragment value model
//!
//! Fragments are trees of plain data plus opaque values. Opaque values are
//! never merged field by field; the set of recognized kinds is closed and
//! registered in [`OpaqueRegistry`].

mod color;

pub use color::{Color, ColorParseError};

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::ops::Index;

/// Ordered mapping used for every object in a configuration tree.
pub type ConfigMap = IndexMap<String, ConfigValue>;

/// A configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<ConfigValue>),
    Object(ConfigMap),
    Opaque(OpaqueValue),
}

/// A value with identity beyond plain key/value data.
#[derive(Debug, Clone, PartialEq)]
pub enum OpaqueValue {
    Color(Color),
}

/// Registered opaque kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpaqueKind {
    Color,
}

impl OpaqueKind {
    /// Every kind known to this crate.
    pub const ALL: &'static [OpaqueKind] = &[OpaqueKind::Color];

    /// Key that marks this kind in a loaded document, e.g. `{"$color": "#fff"}`.
    pub fn tag(&self) -> &'static str {
        match self {
            OpaqueKind::Color => "$color",
        }
    }
}

impl OpaqueValue {
    pub fn kind(&self) -> OpaqueKind {
        match self {
            OpaqueValue::Color(_) => OpaqueKind::Color,
        }
    }

    /// Downstream rendering of the value.
    pub fn to_json(&self) -> Value {
        match self {
            OpaqueValue::Color(c) => Value::String(c.to_hex()),
        }
    }
}

/// Decides which document shapes load as opaque values.
#[derive(Debug, Clone)]
pub struct OpaqueRegistry {
    kinds: Vec<OpaqueKind>,
}

impl Default for OpaqueRegistry {
    fn default() -> Self {
        Self {
            kinds: OpaqueKind::ALL.to_vec(),
        }
    }
}

impl OpaqueRegistry {
    /// Registry that recognizes nothing; every mapping loads as plain data.
    pub fn empty() -> Self {
        Self { kinds: Vec::new() }
    }

    pub fn recognizes(&self, kind: OpaqueKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Returns `Some` when `map` is a tagged opaque encoding.
    fn recognize(
        &self,
        map: &serde_json::Map<String, Value>,
    ) -> Option<Result<OpaqueValue, ColorParseError>> {
        if map.len() != 1 {
            return None;
        }
        let (key, value) = map.iter().next()?;
        let kind = self.kinds.iter().find(|k| k.tag() == key)?;
        match kind {
            OpaqueKind::Color => {
                let parsed = match value.as_str() {
                    Some(s) => Color::parse(s).map(OpaqueValue::Color),
                    None => Err(ColorParseError(value.to_string())),
                };
                Some(parsed)
            }
        }
    }
}

impl ConfigValue {
    pub fn empty_object() -> Self {
        ConfigValue::Object(ConfigMap::new())
    }

    /// Convert a parsed document, recognizing tagged opaque values.
    pub fn from_json(value: Value, registry: &OpaqueRegistry) -> Result<Self, ColorParseError> {
        Ok(match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => ConfigValue::Number(n),
            Value::String(s) => ConfigValue::String(s),
            Value::Array(items) => ConfigValue::Array(
                items
                    .into_iter()
                    .map(|v| Self::from_json(v, registry))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                if let Some(opaque) = registry.recognize(&map) {
                    return opaque.map(ConfigValue::Opaque);
                }
                let mut out = ConfigMap::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, Self::from_json(v, registry)?);
                }
                ConfigValue::Object(out)
            }
        })
    }

    /// Plain JSON rendering; opaque values use their downstream form.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Number(n) => Value::Number(n.clone()),
            ConfigValue::String(s) => Value::String(s.clone()),
            ConfigValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            ConfigValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            ConfigValue::Opaque(o) => o.to_json(),
        }
    }

    /// Number from a float; integral values become integers. Non-finite
    /// input yields `None`.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
            return Some(ConfigValue::Number(Number::from(value as i64)));
        }
        Number::from_f64(value).map(ConfigValue::Number)
    }

    /// Whether the merger must treat this value as an atomic unit.
    pub fn is_opaque(&self) -> bool {
        matches!(self, ConfigValue::Opaque(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ConfigValue::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ConfigValue::Array(_))
    }

    pub fn as_object(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<ConfigValue>> {
        match self {
            ConfigValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<&Color> {
        match self {
            ConfigValue::Opaque(OpaqueValue::Color(c)) => Some(c),
            _ => None,
        }
    }

    /// Member of an object, `None` for other shapes.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_object().and_then(|m| m.get(key))
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "boolean",
            ConfigValue::Number(_) => "number",
            ConfigValue::String(_) => "string",
            ConfigValue::Array(_) => "array",
            ConfigValue::Object(_) => "object",
            ConfigValue::Opaque(OpaqueValue::Color(_)) => "color",
        }
    }
}

static NULL: ConfigValue = ConfigValue::Null;

/// `value["key"]` reads an object member, yielding `Null` when absent.
impl Index<&str> for ConfigValue {
    type Output = ConfigValue;

    fn index(&self, key: &str) -> &ConfigValue {
        self.get(key).unwrap_or(&NULL)
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Plain conversion; tagged mappings are not treated as opaque.
impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(b),
            Value::Number(n) => ConfigValue::Number(n),
            Value::String(s) => ConfigValue::String(s),
            Value::Array(items) => ConfigValue::Array(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ConfigValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Number(n.into())
    }
}

impl From<i32> for ConfigValue {
    fn from(n: i32) -> Self {
        ConfigValue::Number(n.into())
    }
}

impl From<u64> for ConfigValue {
    fn from(n: u64) -> Self {
        ConfigValue::Number(n.into())
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        ConfigValue::from_f64(n).unwrap_or(ConfigValue::Null)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::String(s)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(items: Vec<ConfigValue>) -> Self {
        ConfigValue::Array(items)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(map: ConfigMap) -> Self {
        ConfigValue::Object(map)
    }
}

impl From<Color> for ConfigValue {
    fn from(c: Color) -> Self {
        ConfigValue::Opaque(OpaqueValue::Color(c))
    }
}
