//! Scalar property value stored on nodes and edges.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar value of a property.
///
/// Properties are flat: strings, numbers and booleans. Structured values are
/// expressed as composite topics, never as nested properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::String(_) => "STRING",
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Value::Null) }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text fed to the fulltext index. `None` for `Null`.
    pub fn index_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
        }
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Bool(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Int(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Int(v) } }
impl From<u32> for Value { fn from(v: u32) -> Self { Value::Int(v as i64) } }
impl From<f64> for Value { fn from(v: f64) -> Self { Value::Float(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self { v.map(Into::into).unwrap_or(Value::Null) }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
        }
    }
}
