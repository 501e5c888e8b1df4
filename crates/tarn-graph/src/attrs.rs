use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tarn_core::{Result, TarnError};

/// A single operator attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttrValue {
    /// Human-readable name of the contained type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Str(_) => "str",
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Bool(_) => "bool",
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

/// String-keyed attribute map attached to an op node.
///
/// Lookups that find an attribute of the wrong type are errors, not
/// silent misses: a typo'd graph should fail loudly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrMap {
    map: HashMap<String, AttrValue>,
}

impl AttrMap {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute, replacing any previous value under the name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        self.map.insert(name.into(), value.into());
    }

    /// Raw lookup.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.map.get(name)
    }

    /// Whether an attribute with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the map holds no attributes.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Get a string attribute. Errors if present with a different type.
    pub fn get_str(&self, name: &str) -> Result<Option<&str>> {
        match self.map.get(name) {
            None => Ok(None),
            Some(AttrValue::Str(s)) => Ok(Some(s)),
            Some(other) => Err(TarnError::AttrTypeMismatch {
                attr: name.to_string(),
                expected: "str",
                got: other.type_name(),
            }),
        }
    }

    /// Get a string attribute, falling back to a default when absent.
    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        Ok(self.get_str(name)?.unwrap_or(default))
    }

    /// Get an integer attribute. Errors if present with a different type.
    pub fn get_int(&self, name: &str) -> Result<Option<i64>> {
        match self.map.get(name) {
            None => Ok(None),
            Some(AttrValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(TarnError::AttrTypeMismatch {
                attr: name.to_string(),
                expected: "int",
                got: other.type_name(),
            }),
        }
    }

    /// Get a float attribute. Errors if present with a different type.
    pub fn get_float(&self, name: &str) -> Result<Option<f64>> {
        match self.map.get(name) {
            None => Ok(None),
            Some(AttrValue::Float(v)) => Ok(Some(*v)),
            Some(other) => Err(TarnError::AttrTypeMismatch {
                attr: name.to_string(),
                expected: "float",
                got: other.type_name(),
            }),
        }
    }

    /// Get a bool attribute. Errors if present with a different type.
    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.map.get(name) {
            None => Ok(None),
            Some(AttrValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(TarnError::AttrTypeMismatch {
                attr: name.to_string(),
                expected: "bool",
                got: other.type_name(),
            }),
        }
    }

    /// Iterate over (name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.map.iter()
    }
}
