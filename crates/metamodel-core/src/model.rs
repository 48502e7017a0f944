//! Model description types
//!
//! The raw entity/attribute/reference graph as supplied by a loader, and the
//! normalized form consumers build from it. Every name-keyed map is an
//! `IndexMap` so declared order survives into generated output.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;

/// A complete model description: entity name -> entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelDescription {
    pub entities: IndexMap<String, EntityDescription>,
}

impl ModelDescription {
    /// Create an empty model description
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a model description from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ModelError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_json_str(&contents)
    }

    /// Parse a model description from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        serde_json::from_str(json).map_err(|e| ModelError::ParseError(e.to_string()))
    }

    /// Add an entity, replacing any previous entity of the same name
    pub fn insert(&mut self, name: impl Into<String>, entity: EntityDescription) -> &mut Self {
        self.entities.insert(name.into(), entity);
        self
    }

    /// Get an entity by name
    pub fn get(&self, name: &str) -> Option<&EntityDescription> {
        self.entities.get(name)
    }

    /// Iterate entities in declared order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntityDescription)> {
        self.entities.iter()
    }

    /// Entity names in declared order
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// A single entity as declared in the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDescription {
    /// Free-text description
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared attributes
    #[serde(default)]
    pub attributes: IndexMap<String, RawAttribute>,

    /// Declared references to other entities
    #[serde(default)]
    pub references: IndexMap<String, RawReference>,
}

impl EntityDescription {
    /// Create an empty entity
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: impl Into<RawAttribute>) -> Self {
        self.attributes.insert(name.into(), attribute.into());
        self
    }

    /// Add a reference
    pub fn with_reference(mut self, name: impl Into<String>, reference: impl Into<RawReference>) -> Self {
        self.references.insert(name.into(), reference.into());
        self
    }

    /// Whether an attribute of this name is declared
    pub fn declares_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }
}

/// Attribute configuration, either the shorthand type name or the full object
///
/// Any non-object value is taken as the shorthand type and left for
/// validation to judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAttribute {
    /// `"email": { "type": "string", "in_key_hash": true }`
    Full(AttributeConfig),

    /// `"email": "string"`
    Shorthand(Value),
}

impl RawAttribute {
    /// Expand to the canonical object form
    pub fn into_config(self) -> AttributeConfig {
        match self {
            Self::Shorthand(attr_type) => AttributeConfig {
                attr_type: Some(attr_type),
                ..AttributeConfig::default()
            },
            Self::Full(config) => config,
        }
    }

    /// Expand to the canonical object form without consuming
    pub fn to_config(&self) -> AttributeConfig {
        self.clone().into_config()
    }
}

impl From<&str> for RawAttribute {
    fn from(attr_type: &str) -> Self {
        Self::Shorthand(Value::from(attr_type))
    }
}

impl From<AttributeConfig> for RawAttribute {
    fn from(config: AttributeConfig) -> Self {
        Self::Full(config)
    }
}

/// Full attribute configuration
///
/// The type and the flags are kept as loosely typed values: a malformed
/// entry is reported by validation and left in place, never coerced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeConfig {
    /// Attribute type name (`string` when omitted, after normalization)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub attr_type: Option<Value>,

    /// Free-text description
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Flags (`in_content_hash`, `in_key_hash`, `nullable`, ...) and any other keys
    #[serde(flatten)]
    pub flags: IndexMap<String, Value>,
}

impl AttributeConfig {
    /// Create a config with only a type
    pub fn of_type(attr_type: impl Into<String>) -> Self {
        Self {
            attr_type: Some(Value::String(attr_type.into())),
            ..Self::default()
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set a flag value
    pub fn with_flag(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.flags.insert(name.into(), value.into());
        self
    }

    /// Raw flag value
    pub fn flag(&self, name: &str) -> Option<&Value> {
        self.flags.get(name)
    }

    /// Flag value if present and boolean
    pub fn flag_bool(&self, name: &str) -> Option<bool> {
        self.flags.get(name).and_then(Value::as_bool)
    }

    /// Whether this attribute takes part in the identity hash
    pub fn in_key_hash(&self) -> bool {
        self.flag_bool(IN_KEY_HASH).unwrap_or(false)
    }

    /// Type name, `string` if not yet normalized and empty if the type is not a string
    pub fn type_name(&self) -> &str {
        match &self.attr_type {
            None => DEFAULT_ATTRIBUTE_TYPE,
            Some(attr_type) => attr_type.as_str().unwrap_or(""),
        }
    }
}

/// Type assigned to attributes that declare none
pub const DEFAULT_ATTRIBUTE_TYPE: &str = "string";

/// Flag marking an attribute as part of the content hash
pub const IN_CONTENT_HASH: &str = "in_content_hash";

/// Flag marking an attribute as part of the identity hash
pub const IN_KEY_HASH: &str = "in_key_hash";

/// Flag marking an attribute as optional
pub const NULLABLE: &str = "nullable";

/// Reference configuration, either the shorthand target name or the full object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawReference {
    /// `"owner": { "target": "user", "annotations": { ... } }`
    Full(ReferenceConfig),

    /// `"owner": "user"`
    Shorthand(Value),
}

impl RawReference {
    /// Expand to the canonical object form
    pub fn into_config(self) -> ReferenceConfig {
        match self {
            Self::Shorthand(target) => ReferenceConfig {
                target: Some(target),
                ..ReferenceConfig::default()
            },
            Self::Full(config) => config,
        }
    }

    /// Expand to the canonical object form without consuming
    pub fn to_config(&self) -> ReferenceConfig {
        self.clone().into_config()
    }
}

impl From<&str> for RawReference {
    fn from(target: &str) -> Self {
        Self::Shorthand(Value::from(target))
    }
}

impl From<ReferenceConfig> for RawReference {
    fn from(config: ReferenceConfig) -> Self {
        Self::Full(config)
    }
}

/// Full reference configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Referenced entity name, loosely typed like the attribute type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,

    /// Free-text description
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Per-namespace annotations (one namespace per output target)
    #[serde(default)]
    pub annotations: IndexMap<String, ReferenceAnnotation>,
}

impl ReferenceConfig {
    /// Create a reference to the given target
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: Some(Value::String(target.into())),
            ..Self::default()
        }
    }

    /// Target name, if given as a string
    pub fn target_name(&self) -> Option<&str> {
        self.target.as_ref().and_then(Value::as_str)
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add an annotation for a namespace
    pub fn with_annotation(mut self, namespace: impl Into<String>, annotation: ReferenceAnnotation) -> Self {
        self.annotations.insert(namespace.into(), annotation);
        self
    }
}

/// Namespace-specific reference settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAnnotation {
    /// Maximum number of referenced records (1 means a singular association)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<Value>,

    /// Representation of a multi-valued association (`single`, `list`, `connection`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<Value>,
}

impl ReferenceAnnotation {
    pub fn new(upper_bound: Option<i64>, reference_type: Option<ReferenceType>) -> Self {
        Self {
            upper_bound: upper_bound.map(Value::from),
            reference_type: reference_type.map(|t| Value::from(t.as_str())),
        }
    }

    /// Parsed reference type, `Err` carrying the raw value if unrecognized
    pub fn parsed_type(&self) -> Result<Option<ReferenceType>, String> {
        match &self.reference_type {
            None => Ok(None),
            Some(raw) => raw
                .as_str()
                .and_then(ReferenceType::parse)
                .map(Some)
                .ok_or_else(|| value_text(raw)),
        }
    }

    /// Parsed upper bound, `Err` carrying the raw value if not an integer
    pub fn parsed_upper_bound(&self) -> Result<Option<i64>, String> {
        match &self.upper_bound {
            None => Ok(None),
            Some(raw) => raw.as_i64().map(Some).ok_or_else(|| value_text(raw)),
        }
    }

    /// Cardinality described by this annotation
    pub fn cardinality(&self) -> ReferenceType {
        let parsed = self.parsed_type().ok().flatten();
        let upper_bound = self.parsed_upper_bound().ok().flatten();
        if upper_bound == Some(1) || parsed == Some(ReferenceType::Single) {
            ReferenceType::Single
        } else if parsed == Some(ReferenceType::Connection) {
            ReferenceType::Connection
        } else {
            ReferenceType::List
        }
    }
}

/// Representation of a reference in an output target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    /// Singular association
    Single,

    /// Plain list of the target
    List,

    /// Paginated connection to the target
    Connection,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::List => "list",
            Self::Connection => "connection",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "single" => Some(Self::Single),
            "list" => Some(Self::List),
            "connection" => Some(Self::Connection),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The validated, defaulted model built by a consumer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedModel {
    pub entities: IndexMap<String, NormalizedEntity>,
}

impl NormalizedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&NormalizedEntity> {
        self.entities.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut NormalizedEntity> {
        self.entities.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Normalized attribute of an entity
    pub fn attribute(&self, entity: &str, attribute: &str) -> Option<&AttributeConfig> {
        self.entities.get(entity)?.attributes.get(attribute)
    }

    /// Normalized reference of an entity
    pub fn reference(&self, entity: &str, reference: &str) -> Option<&NormalizedReference> {
        self.entities.get(entity)?.references.get(reference)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NormalizedEntity)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A normalized entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEntity {
    pub description: String,
    pub attributes: IndexMap<String, AttributeConfig>,
    pub references: IndexMap<String, NormalizedReference>,
}

impl NormalizedEntity {
    /// Whether any attribute takes part in the identity hash
    pub fn has_key_attribute(&self) -> bool {
        self.attributes.values().any(AttributeConfig::in_key_hash)
    }
}

/// A normalized reference; the target is always present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReference {
    pub target: String,
    pub description: String,
    pub annotations: IndexMap<String, ReferenceAnnotation>,
}

impl NormalizedReference {
    /// Cardinality in the given annotation namespace
    ///
    /// A reference without an annotation for the namespace is singular.
    pub fn cardinality(&self, namespace: &str) -> ReferenceType {
        self.annotations
            .get(namespace)
            .map(ReferenceAnnotation::cardinality)
            .unwrap_or(ReferenceType::Single)
    }

    /// Upper bound in the given annotation namespace
    pub fn upper_bound(&self, namespace: &str) -> Option<i64> {
        self.annotations.get(namespace)?.parsed_upper_bound().ok().flatten()
    }
}

/// Text of a loosely typed value for messages: strings as is, anything else as JSON
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Free text from any JSON value; `null` reads as absent
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        other => Some(value_text(&other)),
    })
}

/// Model loading errors
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to read model file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse model: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parse_shorthand_and_full_forms() {
        let model = ModelDescription::from_json_str(
            r#"{
                "user": {
                    "description": "A user",
                    "attributes": {
                        "email": "string",
                        "age": { "type": "number", "nullable": false }
                    },
                    "references": {
                        "account": "account",
                        "roles": {
                            "target": "role",
                            "annotations": { "graphql": { "upper_bound": 5, "reference_type": "list" } }
                        }
                    }
                }
            }"#,
        )
        .unwrap();

        let user = model.get("user").unwrap();
        assert_eq!(user.description.as_deref(), Some("A user"));
        assert_eq!(user.attributes["email"], RawAttribute::Shorthand(json!("string")));

        let age = user.attributes["age"].to_config();
        assert_eq!(age.type_name(), "number");
        assert_eq!(age.flag("nullable"), Some(&json!(false)));

        let roles = user.references["roles"].to_config();
        assert_eq!(roles.target_name(), Some("role"));
        assert_eq!(roles.annotations["graphql"].parsed_upper_bound(), Ok(Some(5)));
    }

    #[test]
    fn declared_order_is_preserved() {
        let model = ModelDescription::from_json_str(
            r#"{ "zeta": {}, "alpha": { "attributes": { "b": "string", "a": "number" } }, "mid": {} }"#,
        )
        .unwrap();

        assert_eq!(model.entity_names(), vec!["zeta", "alpha", "mid"]);
        let attrs: Vec<&String> = model.get("alpha").unwrap().attributes.keys().collect();
        assert_eq!(attrs, vec!["b", "a"]);
    }

    #[test]
    fn shorthand_expansion() {
        let attr = RawAttribute::from("number").into_config();
        assert_eq!(attr, AttributeConfig::of_type("number"));

        let reference = RawReference::from("user").into_config();
        assert_eq!(reference.target_name(), Some("user"));
        assert!(reference.annotations.is_empty());
    }

    #[test]
    fn malformed_model_is_a_parse_error() {
        let err = ModelDescription::from_json_str("[1, 2]").unwrap_err();
        assert!(matches!(err, ModelError::ParseError(_)));
    }

    #[test]
    fn reference_cardinality() {
        let single = ReferenceAnnotation::new(Some(1), Some(ReferenceType::Connection));
        assert_eq!(single.cardinality(), ReferenceType::Single);

        let connection = ReferenceAnnotation::new(Some(10), Some(ReferenceType::Connection));
        assert_eq!(connection.cardinality(), ReferenceType::Connection);

        let list = ReferenceAnnotation::new(None, None);
        assert_eq!(list.cardinality(), ReferenceType::List);

        let reference = NormalizedReference {
            target: "user".to_string(),
            description: String::new(),
            annotations: IndexMap::from([("graphql".to_string(), connection)]),
        };
        assert_eq!(reference.cardinality("graphql"), ReferenceType::Connection);
        assert_eq!(reference.cardinality("tdg"), ReferenceType::Single);
        assert_eq!(reference.upper_bound("graphql"), Some(10));
    }

    #[test]
    fn unknown_reference_type_is_reported_raw() {
        let annotation = ReferenceAnnotation {
            upper_bound: Some(json!("many")),
            reference_type: Some(json!("graph")),
        };
        assert_eq!(annotation.parsed_type(), Err("graph".to_string()));
        assert_eq!(annotation.parsed_upper_bound(), Err("many".to_string()));
        assert_eq!(annotation.cardinality(), ReferenceType::List);
    }

    #[test]
    fn wrongly_typed_values_still_load() {
        let model = ModelDescription::from_json_str(
            r#"{
                "user": {
                    "description": 42,
                    "attributes": {
                        "age": { "type": 5, "description": true },
                        "tags": ["a", "b"]
                    },
                    "references": {
                        "owner": 7,
                        "roles": { "target": "role", "annotations": { "graphql": { "upper_bound": "ten", "reference_type": 3 } } }
                    }
                }
            }"#,
        )
        .unwrap();

        let user = model.get("user").unwrap();
        assert_eq!(user.description.as_deref(), Some("42"));

        let age = user.attributes["age"].to_config();
        assert_eq!(age.attr_type, Some(json!(5)));
        assert_eq!(age.type_name(), "");
        assert_eq!(age.description.as_deref(), Some("true"));
        assert_eq!(user.attributes["tags"].to_config().attr_type, Some(json!(["a", "b"])));

        let owner = user.references["owner"].to_config();
        assert_eq!(owner.target, Some(json!(7)));
        assert_eq!(owner.target_name(), None);

        let roles = user.references["roles"].to_config();
        assert_eq!(roles.annotations["graphql"].parsed_upper_bound(), Err("ten".to_string()));
        assert_eq!(roles.annotations["graphql"].parsed_type(), Err("3".to_string()));
    }

    #[test]
    fn value_text_renders_strings_bare() {
        assert_eq!(value_text(&json!("integer")), "integer");
        assert_eq!(value_text(&json!(5)), "5");
        assert_eq!(value_text(&json!(null)), "null");
    }

    #[test]
    fn key_attribute_detection() {
        let mut entity = NormalizedEntity::default();
        entity.attributes.insert("email".to_string(), AttributeConfig::of_type("string"));
        assert!(!entity.has_key_attribute());

        entity.attributes.insert(
            "login".to_string(),
            AttributeConfig::of_type("string").with_flag(IN_KEY_HASH, true),
        );
        assert!(entity.has_key_attribute());
    }
}
