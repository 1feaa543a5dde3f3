//! Request-scoped value container handed between the ingress and relay sides.
//!
//! # Wire format
//!
//! A context serializes to `{"data": {<key>: <value>, ...}}`. The `data`
//! member is omitted when the context is empty, and a missing or `null`
//! `data` member decodes to an empty context.

use std::collections::BTreeMap;
use std::fs::File;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::types::Value;

/// Errors raised by [`Context`] accessors and codecs.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("context key \"{key}\" did not reference {expected} as expected (found {found})")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("error base64 decoding string referenced by context key \"{key}\": {source}")]
    Encoding {
        key: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("error serializing context: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("error deserializing context: {0}")]
    Deserialization(#[source] serde_json::Error),
    #[error("error opening file \"{path}\": {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// String-keyed bag of [`Value`]s moved between the two sides of a relay.
///
/// A context has exactly one owner at a time. The producer fills it before
/// hand-off and the consumer writes into it after processing; it is moved,
/// never shared, so no interior locking is needed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "nullable_map"
    )]
    data: BTreeMap<String, Value>,
}

fn nullable_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BTreeMap<String, Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`, or `default` when absent.
    ///
    /// Performs no type checking and never fails.
    #[must_use]
    pub fn get<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.data.get(key).unwrap_or(default)
    }

    /// Returns the string stored under `key`, or `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] if the key holds a non-string.
    pub fn get_string(&self, key: &str, default: &str) -> Result<String, ContextError> {
        match self.data.get(key) {
            None => Ok(default.to_string()),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(ContextError::TypeMismatch {
                key: key.to_string(),
                expected: "a string",
                found: other.kind(),
            }),
        }
    }

    /// Returns the bytes stored under `key` (base64 text on the wire), or
    /// `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] if the key holds a non-string and
    /// [`ContextError::Encoding`] if the string is not valid standard base64.
    pub fn get_bytes(&self, key: &str, default: &[u8]) -> Result<Vec<u8>, ContextError> {
        match self.data.get(key) {
            None => Ok(default.to_vec()),
            Some(Value::String(s)) => STANDARD.decode(s).map_err(|source| ContextError::Encoding {
                key: key.to_string(),
                source,
            }),
            Some(other) => Err(ContextError::TypeMismatch {
                key: key.to_string(),
                expected: "base64 encoded bytes",
                found: other.kind(),
            }),
        }
    }

    /// Opens the local file whose path is stored under `key`.
    ///
    /// An absent key or an empty path yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] if the key holds a non-string and
    /// [`ContextError::File`] if the file cannot be opened.
    pub fn get_file(&self, key: &str) -> Result<Option<File>, ContextError> {
        let path = self.get_string(key, "")?;
        if path.is_empty() {
            return Ok(None);
        }
        File::open(&path)
            .map(Some)
            .map_err(|source| ContextError::File { path, source })
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Stores `bytes` under `key` as standard base64 text.
    pub fn set_bytes(&mut self, key: impl Into<String>, bytes: &[u8]) {
        self.data
            .insert(key.into(), Value::String(STANDARD.encode(bytes)));
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Read-only view of the underlying map.
    #[must_use]
    pub fn raw(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    /// Serializes the context to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Serialization`] if encoding fails.
    pub fn encode(&self) -> Result<Vec<u8>, ContextError> {
        serde_json::to_vec(self).map_err(ContextError::Serialization)
    }

    /// Reconstructs a context from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Deserialization`] if the bytes are not a valid
    /// context document.
    pub fn decode(bytes: &[u8]) -> Result<Self, ContextError> {
        serde_json::from_slice(bytes).map_err(ContextError::Deserialization)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
