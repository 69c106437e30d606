//! Declarative rule configuration.
//!
//! [`RuleMetadata`] maps field paths to ordered lists of
//! [`ValidatorDescriptor`]s. It loads from JSON and keeps the document's key
//! order, since tracked-field discovery and error merging follow that order.
//!
//! ```rust,ignore
//! let metadata = RuleMetadata::from_json_str(r#"{
//!     "username": [
//!         { "name": "required" },
//!         { "name": "len", "config": { "minLength": 3, "maxLength": 20 } },
//!         { "name": "usernameFree", "isAsync": true }
//!     ],
//!     "alternateEmail": [
//!         { "name": "doesNotMatch", "config": { "source": ["email"], "subscribe": true } }
//!     ]
//! }"#)?;
//! ```

use crate::error::{json_type_name, ConfigError};
use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// One rule to apply to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorDescriptor {
    /// Registry name of the rule
    pub name: String,
    /// Opaque parameters handed to the rule factory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    /// Whether the rule belongs to the asynchronous group
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_async: bool,
}

impl ValidatorDescriptor {
    /// Create a descriptor without configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: None,
            is_async: false,
        }
    }

    /// Attach configuration.
    pub fn with_config(mut self, config: impl Into<Value>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Place the rule in the asynchronous group.
    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    /// Read the configuration as a [`GroupValidatorConfig`], if it has that shape.
    pub fn group_config(&self) -> Option<GroupValidatorConfig> {
        self.config.as_ref().and_then(GroupValidatorConfig::from_value)
    }
}

/// Ordered mapping from field path to the rules applied to that field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleMetadata {
    entries: Vec<(String, Vec<ValidatorDescriptor>)>,
}

impl RuleMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn rule(
        mut self,
        path: impl Into<String>,
        descriptors: impl IntoIterator<Item = ValidatorDescriptor>,
    ) -> Self {
        self.insert(path, descriptors.into_iter().collect());
        self
    }

    /// Set the rules for a path. An existing path keeps its position.
    pub fn insert(&mut self, path: impl Into<String>, descriptors: Vec<ValidatorDescriptor>) {
        let path = path.into();
        match self.entries.iter_mut().find(|(p, _)| *p == path) {
            Some((_, existing)) => *existing = descriptors,
            None => self.entries.push((path, descriptors)),
        }
    }

    /// Rules configured for a path.
    pub fn get(&self, path: &str) -> Option<&[ValidatorDescriptor]> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, descriptors)| descriptors.as_slice())
    }

    /// Configured paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    /// `(path, rules)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ValidatorDescriptor])> {
        self.entries
            .iter()
            .map(|(p, descriptors)| (p.as_str(), descriptors.as_slice()))
    }

    /// Number of configured paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no path is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse metadata from a JSON document in a single pass.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        match serde_json::from_str(json)? {
            MetadataDocument::Rules(metadata) => Ok(metadata),
            MetadataDocument::Other(found) => Err(ConfigError::Shape { found }),
        }
    }

    /// Build metadata from an already parsed JSON value.
    ///
    /// Paths follow the iteration order of the value's object, which is
    /// sorted unless `serde_json` keeps insertion order. Prefer
    /// [`from_json_str`](Self::from_json_str) when document order matters.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        if !value.is_object() {
            return Err(ConfigError::Shape {
                found: json_type_name(&value),
            });
        }
        Ok(serde_json::from_value(value)?)
    }
}

impl Serialize for RuleMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, descriptors) in &self.entries {
            map.serialize_entry(path, descriptors)?;
        }
        map.end()
    }
}

struct MetadataVisitor;

impl<'de> Visitor<'de> for MetadataVisitor {
    type Value = RuleMetadata;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field path to validator descriptors")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RuleMetadata, A::Error> {
        let mut metadata = RuleMetadata::new();
        while let Some((path, descriptors)) =
            access.next_entry::<String, Vec<ValidatorDescriptor>>()?
        {
            metadata.insert(path, descriptors);
        }
        Ok(metadata)
    }
}

impl<'de> Deserialize<'de> for RuleMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MetadataVisitor)
    }
}

/// A JSON document that is either rule metadata or some other JSON type.
enum MetadataDocument {
    Rules(RuleMetadata),
    Other(&'static str),
}

impl<'de> Deserialize<'de> for MetadataDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = MetadataDocument;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON document")
            }

            fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<MetadataDocument, A::Error> {
                MetadataVisitor.visit_map(access).map(MetadataDocument::Rules)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<MetadataDocument, A::Error> {
                while access.next_element::<IgnoredAny>()?.is_some() {}
                Ok(MetadataDocument::Other("array"))
            }

            fn visit_str<E: de::Error>(self, _: &str) -> Result<MetadataDocument, E> {
                Ok(MetadataDocument::Other("string"))
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<MetadataDocument, E> {
                Ok(MetadataDocument::Other("boolean"))
            }

            fn visit_i64<E: de::Error>(self, _: i64) -> Result<MetadataDocument, E> {
                Ok(MetadataDocument::Other("number"))
            }

            fn visit_u64<E: de::Error>(self, _: u64) -> Result<MetadataDocument, E> {
                Ok(MetadataDocument::Other("number"))
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<MetadataDocument, E> {
                Ok(MetadataDocument::Other("number"))
            }

            fn visit_unit<E: de::Error>(self) -> Result<MetadataDocument, E> {
                Ok(MetadataDocument::Other("null"))
            }
        }

        deserializer.deserialize_any(DocumentVisitor)
    }
}

impl<P: Into<String>> FromIterator<(P, Vec<ValidatorDescriptor>)> for RuleMetadata {
    fn from_iter<I: IntoIterator<Item = (P, Vec<ValidatorDescriptor>)>>(iter: I) -> Self {
        let mut metadata = RuleMetadata::new();
        for (path, descriptors) in iter {
            metadata.insert(path, descriptors);
        }
        metadata
    }
}

/// Configuration of a cross-field rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupValidatorConfig {
    /// Sibling whose error set receives the outcome (default: the rule's own field)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber: Option<String>,
    /// Sibling paths compared against
    #[serde(default, deserialize_with = "deserialize_source")]
    pub source: Vec<String>,
    /// Keep the rule's own field live-revalidated on any tree change
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub subscribe: bool,
}

impl GroupValidatorConfig {
    /// Compare against the given sibling paths.
    pub fn new<S: Into<String>>(source: impl IntoIterator<Item = S>) -> Self {
        Self {
            subscriber: None,
            source: source.into_iter().map(Into::into).collect(),
            subscribe: false,
        }
    }

    /// Route the outcome to another sibling.
    pub fn subscriber(mut self, path: impl Into<String>) -> Self {
        self.subscriber = Some(path.into());
        self
    }

    /// Keep the owning field live-revalidated.
    pub fn subscribe(mut self) -> Self {
        self.subscribe = true;
        self
    }

    /// Read the config from an opaque rule payload.
    ///
    /// Returns `None` for payloads that are not objects or do not fit the shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

impl From<GroupValidatorConfig> for Value {
    fn from(config: GroupValidatorConfig) -> Self {
        serde_json::to_value(config).unwrap_or(Value::Null)
    }
}

/// `source` is either a plain list or wrapped as `{ "group": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SourceSpec {
    Paths(Vec<String>),
    Group { group: Vec<String> },
}

fn deserialize_source<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match SourceSpec::deserialize(deserializer)? {
        SourceSpec::Paths(paths) => paths,
        SourceSpec::Group { group } => group,
    })
}

/// Length bounds for the `len` rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LengthConfig {
    /// Minimum length (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum length (inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
}

impl LengthConfig {
    /// Both bounds.
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length: Some(min_length),
            max_length: Some(max_length),
        }
    }
}

impl From<LengthConfig> for Value {
    fn from(config: LengthConfig) -> Self {
        serde_json::to_value(config).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_preserves_document_order() {
        let metadata = RuleMetadata::from_json_str(
            r#"{
                "zeta": [{ "name": "required" }],
                "alpha": [{ "name": "email" }],
                "mid": []
            }"#,
        )
        .unwrap();

        let paths: Vec<_> = metadata.paths().collect();
        assert_eq!(paths, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn metadata_duplicate_key_keeps_first_position_last_value() {
        let metadata = RuleMetadata::from_json_str(
            r#"{ "a": [{ "name": "required" }], "b": [], "a": [{ "name": "email" }] }"#,
        )
        .unwrap();

        assert_eq!(metadata.paths().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(metadata.get("a").unwrap()[0].name, "email");
    }

    #[test]
    fn metadata_rejects_non_object() {
        let err = RuleMetadata::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::Shape { found: "array" }));

        let err = RuleMetadata::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));

        let err = RuleMetadata::from_value(json!("text")).unwrap_err();
        assert!(matches!(err, ConfigError::Shape { found: "string" }));
    }

    #[test]
    fn every_scalar_document_is_a_shape_error() {
        for (json, expected) in [
            ("null", "null"),
            ("true", "boolean"),
            ("-3", "number"),
            ("2.5", "number"),
            (r#""rules""#, "string"),
            (r#"[{ "name": "required" }]"#, "array"),
        ] {
            match RuleMetadata::from_json_str(json) {
                Err(ConfigError::Shape { found }) => assert_eq!(found, expected, "{json}"),
                other => panic!("{json}: unexpected {other:?}"),
            }
        }

        assert!(matches!(
            RuleMetadata::from_json_str("[1,"),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            RuleMetadata::from_json_str(r#"{ "a": 1 }"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn descriptor_json_shape() {
        let descriptor: ValidatorDescriptor =
            serde_json::from_value(json!({ "name": "taken", "isAsync": true })).unwrap();
        assert_eq!(descriptor, ValidatorDescriptor::new("taken").asynchronous());

        let value = serde_json::to_value(ValidatorDescriptor::new("required")).unwrap();
        assert_eq!(value, json!({ "name": "required" }));
    }

    #[test]
    fn metadata_serializes_in_order() {
        let metadata = RuleMetadata::new()
            .rule("b", [ValidatorDescriptor::new("required")])
            .rule("a", []);
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"b":[{"name":"required"}],"a":[]}"#);
    }

    #[test]
    fn group_config_accepts_both_source_forms() {
        let plain = GroupValidatorConfig::from_value(&json!({ "source": ["a", "b"] })).unwrap();
        assert_eq!(plain.source, vec!["a", "b"]);

        let wrapped =
            GroupValidatorConfig::from_value(&json!({ "source": { "group": ["c"] }, "subscribe": true }))
                .unwrap();
        assert_eq!(wrapped.source, vec!["c"]);
        assert!(wrapped.subscribe);
    }

    #[test]
    fn group_config_ignores_non_objects() {
        assert!(GroupValidatorConfig::from_value(&json!(3)).is_none());
        assert!(GroupValidatorConfig::from_value(&json!({ "subscriber": 3 })).is_none());
        assert_eq!(
            GroupValidatorConfig::from_value(&json!({ "minLength": 3 })),
            Some(GroupValidatorConfig::default())
        );
    }

    #[test]
    fn length_config_round_trips_camel_case() {
        let value: Value = LengthConfig::new(3, 5).into();
        assert_eq!(value, json!({ "minLength": 3, "maxLength": 5 }));
    }
}
