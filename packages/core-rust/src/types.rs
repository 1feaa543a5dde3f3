use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Runtime value stored under a [`Context`](crate::Context) key.
///
/// Covers every JSON-representable shape. Byte sequences have no variant of
/// their own: they travel as standard base64 text inside [`Value::String`]
/// and are decoded on read by `Context::get_bytes`.
///
/// Serializes untagged, so the wire form of a `Value` is plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON null.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number (integer or finite float).
    Number(serde_json::Number),
    /// JSON string (UTF-8). Also the carrier for base64-encoded bytes.
    String(String),
    /// JSON array.
    Array(Vec<Value>),
    /// JSON object. `BTreeMap` keeps serialization order deterministic.
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the value's shape, used in type-mismatch diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Returns the string slice if this is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str(self.kind()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

/// Non-finite floats have no JSON form and become [`Value::Null`].
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Object(
                map.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_json_shapes() {
        let v: Value = serde_json::from_str(r#"[null, true, 3, -1.5, "s", {"k": [1]}]"#).unwrap();
        let Value::Array(items) = v else {
            panic!("expected array");
        };
        assert!(items[0].is_null());
        assert_eq!(items[1], Value::Bool(true));
        assert_eq!(items[2], Value::from(3i64));
        assert_eq!(items[3].kind(), "number");
        assert_eq!(items[4].as_str(), Some("s"));
        assert_eq!(items[5].kind(), "object");
    }

    #[test]
    fn non_finite_float_becomes_null() {
        assert!(Value::from(f64::NAN).is_null());
        assert_eq!(Value::from(2.5).kind(), "number");
    }

    #[test]
    fn display_is_compact_json() {
        let v = Value::from(vec!["a", "b"]);
        assert_eq!(v.to_string(), r#"["a","b"]"#);
    }

    #[test]
    fn serde_json_value_conversion_is_lossless() {
        let json = serde_json::json!({"a": [1, "two", null, {"b": false}]});
        let back: serde_json::Value = Value::from(json.clone()).into();
        assert_eq!(back, json);
    }
}
