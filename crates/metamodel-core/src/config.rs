//! Configuration schema (metamodel.toml)

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::model::{AttributeConfig, IN_CONTENT_HASH, IN_KEY_HASH, NULLABLE};

/// Kind a flag value must have when explicitly supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    Boolean,
    String,
    Number,
}

impl FlagKind {
    /// Check a runtime value against this kind
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Boolean => value.is_boolean(),
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Number => "number",
        }
    }
}

impl std::fmt::Display for FlagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default value and declared kind of one attribute flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagDefault {
    /// Declared kind
    pub kind: FlagKind,

    /// Value written when the flag is absent
    pub value: Value,

    /// What the flag means
    #[serde(default)]
    pub description: String,
}

impl FlagDefault {
    pub fn boolean(value: bool, description: impl Into<String>) -> Self {
        Self {
            kind: FlagKind::Boolean,
            value: Value::Bool(value),
            description: description.into(),
        }
    }
}

/// Tables driving validation and defaulting
///
/// Immutable once handed to a validator. A table supplied in the config file
/// replaces the built-in one as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Registered attribute types: name -> description
    #[serde(default = "default_types")]
    pub types: IndexMap<String, String>,

    /// Flag defaults keyed by flag name
    #[serde(default = "default_flags")]
    pub flags: IndexMap<String, FlagDefault>,

    /// System attributes injected into every entity
    #[serde(default = "default_attributes")]
    pub default_attributes: IndexMap<String, AttributeConfig>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            types: default_types(),
            flags: default_flags(),
            default_attributes: default_attributes(),
        }
    }
}

impl ValidationConfig {
    /// Whether a type name is registered
    pub fn is_valid_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Replace the registered types
    pub fn with_types<I, K, V>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.types = types.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Replace the default attributes
    pub fn with_default_attributes(mut self, attributes: IndexMap<String, AttributeConfig>) -> Self {
        self.default_attributes = attributes;
        self
    }

    /// Replace the flag defaults
    pub fn with_flags(mut self, flags: IndexMap<String, FlagDefault>) -> Self {
        self.flags = flags;
        self
    }
}

fn default_types() -> IndexMap<String, String> {
    [
        ("string", "Just a string"),
        ("date", "A date time representation"),
        ("boolean", "A boolean value"),
        ("number", "Any valid number"),
        ("list", "A list of one of the above types or of an other object"),
    ]
    .into_iter()
    .map(|(name, description)| (name.to_string(), description.to_string()))
    .collect()
}

fn default_flags() -> IndexMap<String, FlagDefault> {
    IndexMap::from([
        (
            IN_CONTENT_HASH.to_string(),
            FlagDefault::boolean(true, "Defines that this attribute is part of the content hash"),
        ),
        (
            IN_KEY_HASH.to_string(),
            FlagDefault::boolean(
                false,
                "Defines that this attribute is part of the attributes identifying an object",
            ),
        ),
        (
            NULLABLE.to_string(),
            FlagDefault::boolean(true, "Defines if the value may be null or is mandatory"),
        ),
    ])
}

fn system_attribute(attr_type: &str) -> AttributeConfig {
    AttributeConfig::of_type(attr_type)
        .with_flag(IN_CONTENT_HASH, false)
        .with_flag(IN_KEY_HASH, false)
        .with_flag(NULLABLE, false)
}

fn default_attributes() -> IndexMap<String, AttributeConfig> {
    IndexMap::from([
        ("__id_unique".to_string(), system_attribute("number")),
        ("__id_hash".to_string(), system_attribute("string")),
        ("__content_hash".to_string(), system_attribute("string")),
    ])
}

/// GraphQL schema consumer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlConfig {
    /// Template the schema is rendered into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,

    /// Reference annotation namespace
    #[serde(default = "default_graphql_annotation")]
    pub annotation: String,

    /// Attribute holding the unique record id
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

impl Default for GraphQlConfig {
    fn default() -> Self {
        Self {
            template: None,
            annotation: default_graphql_annotation(),
            id_field: default_id_field(),
        }
    }
}

fn default_graphql_annotation() -> String {
    "graphql".to_string()
}

fn default_id_field() -> String {
    "__id_unique".to_string()
}

/// Test-data-generator import consumer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TdgConfig {
    /// Reference annotation namespace
    #[serde(default = "default_tdg_annotation")]
    pub annotation: String,

    /// Number of generation iterations
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

impl Default for TdgConfig {
    fn default() -> Self {
        Self {
            annotation: default_tdg_annotation(),
            iterations: default_iterations(),
        }
    }
}

fn default_tdg_annotation() -> String {
    "tdg".to_string()
}

fn default_iterations() -> u32 {
    1
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Validation and defaulting tables
    #[serde(default)]
    pub validation: ValidationConfig,

    /// GraphQL schema output
    #[serde(default)]
    pub graphql: GraphQlConfig,

    /// Test-data-generator output
    #[serde(default)]
    pub tdg: TdgConfig,
}

impl Config {
    /// Load config from TOML file
    ///
    /// A relative template path is resolved against the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        if let (Some(parent), Some(template)) = (path.parent(), config.graphql.template.as_ref()) {
            if template.is_relative() {
                config.graphql.template = Some(parent.join(template));
            }
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = self.to_toml()?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn default_tables() {
        let config = ValidationConfig::default();

        assert_eq!(
            config.types.keys().collect::<Vec<_>>(),
            vec!["string", "date", "boolean", "number", "list"]
        );
        assert_eq!(config.flags[IN_CONTENT_HASH].value, json!(true));
        assert_eq!(config.flags[IN_KEY_HASH].value, json!(false));
        assert_eq!(config.flags[NULLABLE].value, json!(true));

        for attribute in config.default_attributes.values() {
            assert_eq!(attribute.flag_bool(IN_CONTENT_HASH), Some(false));
            assert_eq!(attribute.flag_bool(IN_KEY_HASH), Some(false));
            assert_eq!(attribute.flag_bool(NULLABLE), Some(false));
        }
        assert_eq!(config.default_attributes["__id_unique"].type_name(), "number");
    }

    #[test]
    fn flag_kind_matching() {
        assert!(FlagKind::Boolean.matches(&json!(true)));
        assert!(!FlagKind::Boolean.matches(&json!("true")));
        assert!(FlagKind::String.matches(&json!("x")));
        assert!(FlagKind::Number.matches(&json!(3.5)));
        assert!(!FlagKind::Number.matches(&json!(null)));
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.graphql.annotation, "graphql");
        assert_eq!(config.tdg.iterations, 1);
    }

    #[test]
    fn supplied_table_replaces_builtin() {
        let config = Config::from_toml(
            r#"
            [validation.types]
            string = "text"
            uuid = "A UUID"

            [validation.flags.indexed]
            kind = "boolean"
            value = false

            [graphql]
            template = "schema.js.jinja"
            id_field = "id"

            [tdg]
            iterations = 4
            "#,
        )
        .unwrap();

        assert!(config.validation.is_valid_type("uuid"));
        assert!(!config.validation.is_valid_type("number"));
        assert_eq!(config.validation.flags.len(), 1);
        assert_eq!(config.validation.flags["indexed"].kind, FlagKind::Boolean);
        assert_eq!(config.validation.default_attributes.len(), 3);
        assert_eq!(config.graphql.template, Some(PathBuf::from("schema.js.jinja")));
        assert_eq!(config.graphql.id_field, "id");
        assert_eq!(config.graphql.annotation, "graphql");
        assert_eq!(config.tdg.iterations, 4);
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = Config::from_toml("[validation\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        let parsed = Config::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn from_file_resolves_template_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metamodel.toml");
        std::fs::write(&path, "[graphql]\ntemplate = \"templates/schema.jinja\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.graphql.template, Some(dir.path().join("templates/schema.jinja")));
    }
}
