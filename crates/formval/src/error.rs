//! Error types for the validation engine.
//!
//! Two families live here. [`FieldErrors`] is validation *data*: the error set
//! a field carries, keyed by rule kind. It is never raised, only returned and
//! attached. [`ConfigError`] and [`RegistryError`] describe problems with the
//! rule configuration itself; the engine degrades past them instead of failing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of running a validation function against a field.
///
/// `Ok(())` means "no error"; `Err` carries the error payload.
pub type ValidationResult = Result<(), FieldErrors>;

/// Error set of a single field: error kind mapped to its payload.
///
/// Serializes to a plain JSON object, e.g.
/// `{"minlength": {"requiredLength": 3, "actualLength": 2}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors {
    kinds: BTreeMap<String, Value>,
}

impl FieldErrors {
    /// Create an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an error set holding one error kind.
    pub fn single(kind: impl Into<String>, payload: impl Into<Value>) -> Self {
        let mut errors = Self::new();
        errors.insert(kind, payload);
        errors
    }

    /// Insert or replace the payload for an error kind.
    pub fn insert(&mut self, kind: impl Into<String>, payload: impl Into<Value>) {
        self.kinds.insert(kind.into(), payload.into());
    }

    /// Remove an error kind, returning its payload.
    pub fn remove(&mut self, kind: &str) -> Option<Value> {
        self.kinds.remove(kind)
    }

    /// Get the payload for an error kind.
    pub fn get(&self, kind: &str) -> Option<&Value> {
        self.kinds.get(kind)
    }

    /// Check whether an error kind is present.
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Merge another error set into this one.
    ///
    /// Keys of `other` overwrite keys already present, so merging in
    /// descriptor order lets the later rule win a collision.
    pub fn merge(&mut self, other: FieldErrors) {
        self.kinds.extend(other.kinds);
    }

    /// Check if there are any errors.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Number of distinct error kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Error kinds present in this set.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Iterate over `(kind, payload)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.kinds.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Convert to a result: `Ok` if empty, `Err(self)` otherwise.
    pub fn into_result(self) -> ValidationResult {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Convert to the optional form stored on a field (`None` when empty).
    pub fn into_option(self) -> Option<FieldErrors> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.kinds().collect();
        write!(f, "validation failed: {}", kinds.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

impl From<FieldErrors> for Value {
    fn from(errors: FieldErrors) -> Self {
        Value::Object(errors.kinds.into_iter().collect())
    }
}

/// Problems found while loading rule metadata.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid JSON.
    #[error("invalid rule metadata JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The document is valid JSON but not a mapping of path to descriptors.
    #[error("rule metadata must be an object of field path to descriptor list, got {found}")]
    Shape {
        /// JSON type that was found instead
        found: &'static str,
    },
}

/// Problems resolving a validator by name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No factory is registered under the name.
    #[error("no validator registered under `{name}`")]
    UnknownValidator {
        /// The name that was looked up
        name: String,
    },
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
