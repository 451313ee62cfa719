//! Request parameters.
//!
//! A [`Params`] is an immutable, sorted bag of named [`Value`]s describing one
//! request: which source to fetch, how to transform it, which quality to
//! encode at. Stages read parameters through the typed accessors, which turn
//! a missing or mistyped parameter into an [`ImageError::Param`] naming it.
//!
//! # Example
//!
//! ```
//! use pixserve::params::{Params, Value};
//!
//! let params = Params::from([
//!     ("source", Value::from("cat.png")),
//!     ("width", Value::from(320)),
//! ]);
//!
//! assert_eq!(params.get_str("source").unwrap(), "cat.png");
//! assert_eq!(params.get_int("width").unwrap(), 320);
//! assert!(params.get_int("height").is_err());
//!
//! // "Adding" a parameter produces a new set.
//! let resized = params.with("height", 200);
//! assert!(!params.contains("height"));
//! assert!(resized.contains("height"));
//! ```

mod canonical;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ImageError;

// =============================================================================
// Value
// =============================================================================

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Params(Params),
    List(Vec<Value>),
}

impl Value {
    /// Name of the value's type, used in error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Params(_) => "params",
            Value::List(_) => "list",
        }
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

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Params> for Value {
    fn from(v: Params) -> Self {
        Value::Params(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Params(p) => write!(f, "{}", p),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

// =============================================================================
// Params
// =============================================================================

/// Immutable set of named request parameters.
///
/// Keys are unique and iterate in lexicographic order. Cloning is cheap: the
/// entries are shared behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Arc<BTreeMap<String, Value>>,
}

impl Params {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new set with `name` bound to `value`, replacing any previous binding.
    pub fn with(&self, name: impl Into<String>, value: impl Into<Value>) -> Params {
        let mut entries = (*self.entries).clone();
        entries.insert(name.into(), value.into());
        Params {
            entries: Arc::new(entries),
        }
    }

    /// Return a new set without `name`.
    pub fn without(&self, name: &str) -> Params {
        if !self.entries.contains_key(name) {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        entries.remove(name);
        Params {
            entries: Arc::new(entries),
        }
    }

    /// Look up a parameter without failing.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Look up a parameter, failing if it is missing.
    pub fn get(&self, name: &str) -> Result<&Value, ImageError> {
        self.entries
            .get(name)
            .ok_or_else(|| ImageError::param(name, "missing"))
    }

    pub fn get_str(&self, name: &str) -> Result<&str, ImageError> {
        match self.get(name)? {
            Value::String(s) => Ok(s),
            other => Err(type_mismatch(name, "string", other)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<i64, ImageError> {
        match self.get(name)? {
            Value::Int(i) => Ok(*i),
            other => Err(type_mismatch(name, "integer", other)),
        }
    }

    /// Get a float parameter. Integers are widened.
    pub fn get_float(&self, name: &str) -> Result<f64, ImageError> {
        match self.get(name)? {
            Value::Float(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            other => Err(type_mismatch(name, "float", other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, ImageError> {
        match self.get(name)? {
            Value::Bool(b) => Ok(*b),
            other => Err(type_mismatch(name, "boolean", other)),
        }
    }

    pub fn get_params(&self, name: &str) -> Result<&Params, ImageError> {
        match self.get(name)? {
            Value::Params(p) => Ok(p),
            other => Err(type_mismatch(name, "params", other)),
        }
    }

    pub fn get_list(&self, name: &str) -> Result<&[Value], ImageError> {
        match self.get(name)? {
            Value::List(items) => Ok(items),
            other => Err(type_mismatch(name, "list", other)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Parameter names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode the set into its canonical, unambiguous byte form.
    ///
    /// Logically identical sets always produce identical bytes regardless of
    /// construction order. See [`crate::cache::ParamsHashKeyGenerator`].
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        canonical::encode_params(self, &mut out);
        out
    }
}

fn type_mismatch(name: &str, expected: &str, got: &Value) -> ImageError {
    ImageError::param(
        name,
        format!("expected {}, got {}", expected, got.type_name()),
    )
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Params {
            entries: Arc::new(entries),
        }
    }
}

impl<K: Into<String>, V: Into<Value>, const N: usize> From<[(K, V); N]> for Params {
    fn from(items: [(K, V); N]) -> Self {
        items.into_iter().collect()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", k, v)?;
        }
        f.write_str("}")
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in self.entries.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// =============================================================================
// JSON Conversion
// =============================================================================

impl TryFrom<serde_json::Value> for Params {
    type Error = ImageError;

    /// Build a parameter set from a JSON object.
    ///
    /// `null` values are rejected, naming the offending key by its dotted path.
    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::Object(map) => params_from_json(map, ""),
            other => Err(ImageError::param(
                "params",
                format!("expected a JSON object, got {}", json_type_name(&other)),
            )),
        }
    }
}

fn params_from_json(
    map: serde_json::Map<String, serde_json::Value>,
    prefix: &str,
) -> Result<Params, ImageError> {
    let mut entries = BTreeMap::new();
    for (key, json) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let value = value_from_json(json, &path)?;
        entries.insert(key, value);
    }
    Ok(Params {
        entries: Arc::new(entries),
    })
}

fn value_from_json(json: serde_json::Value, path: &str) -> Result<Value, ImageError> {
    match json {
        serde_json::Value::Null => Err(ImageError::param(path, "null is not a valid value")),
        serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| ImageError::param(path, format!("unrepresentable number {}", n))),
        },
        serde_json::Value::String(s) => Ok(Value::String(s)),
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| value_from_json(item, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        serde_json::Value::Object(map) => params_from_json(map, path).map(Value::Params),
    }
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
