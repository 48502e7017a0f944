//! Render context for schema templates
//!
//! Object and field definitions are built while a model is parsed and
//! handed to the template in emission order.

use crate::functions::{class_name, getter_name, type_name};
use minijinja::Value as MinijinjaValue;
use serde::Serialize;

/// Generated object for one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDefinition {
    /// Entity name
    pub name: String,

    pub class_name: String,
    pub type_name: String,
    pub getter_name: String,
    pub description: String,

    /// Attribute and reference fields in declaration order
    pub fields: Vec<FieldDefinition>,

    /// Connection type, set when some reference is rendered as a connection to this entity
    pub connection: Option<String>,
}

impl ObjectDefinition {
    /// Create a definition with the names derived from the entity
    pub fn new(entity: &str, description: impl Into<String>) -> Self {
        Self {
            name: entity.to_string(),
            class_name: class_name(entity),
            type_name: type_name(entity),
            getter_name: getter_name(entity),
            description: description.into(),
            fields: Vec::new(),
            connection: None,
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// How a field is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Attribute,
    Single,
    List,
    Connection,
}

/// A single field of an object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,

    /// GraphQL type expression (connection type for connections)
    pub graphql_type: String,
    pub description: String,

    /// Loader of the target, for connection fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub getter: Option<String>,
}

/// Top-level context a schema template is rendered with
#[derive(Debug, Clone, Serialize)]
pub struct SchemaContext<'a> {
    /// Attribute used as the global id source
    pub id_field: &'a str,

    /// Objects in emission order
    pub objects: Vec<&'a ObjectDefinition>,
}

impl SchemaContext<'_> {
    /// Convert to a MiniJinja value for rendering
    pub fn to_minijinja_value(&self) -> MinijinjaValue {
        MinijinjaValue::from_serialize(self)
    }
}
