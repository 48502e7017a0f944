//! GraphQL/Relay schema generation
//!
//! `GraphQlConsumer` validates the model like the base validator and builds
//! one object definition per entity. Rendering orders the objects so every
//! reference target is defined before the objects pointing at it.

use crate::context::{FieldDefinition, FieldKind, ObjectDefinition, SchemaContext};
use crate::functions::{self, connection_type_name, getter_name, type_name};
use indexmap::IndexMap;
use metamodel_core::{
    AttributeConfig, Consumer, EntityDescription, ErrorRecord, FatalError, GraphQlConfig,
    ReferenceConfig, ReferenceType, ValidationConfig,
};
use metamodel_engine::ModelValidator;
use metamodel_parser::CycleDetected;
use minijinja::Environment;
use std::path::{Path, PathBuf};

/// Relay schema template shipped with the crate
pub const BUNDLED_TEMPLATE: &str = include_str!("../templates/relay_schema.js.jinja");

const CONSUMER_NAME: &str = "graphql";

/// Errors raised while producing output
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("The model is not valid ({0} errors), nothing is generated")]
    InvalidModel(usize),

    #[error(transparent)]
    Cycle(#[from] CycleDetected),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialize error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// GraphQL type expression for an attribute type
pub fn graphql_type(attr_type: &str) -> &'static str {
    match attr_type {
        "number" | "date" => "GraphQLInt",
        "boolean" => "GraphQLBoolean",
        "list" => "new GraphQLList(GraphQLString)",
        _ => "GraphQLString",
    }
}

/// Write generated output, creating parent directories as needed
pub(crate) fn write_output(path: &Path, content: &str) -> Result<(), RenderError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| RenderError::io(parent, e))?;
        }
    }
    std::fs::write(path, content).map_err(|e| RenderError::io(path, e))
}

/// Consumer building a Relay-style GraphQL schema
#[derive(Debug, Clone)]
pub struct GraphQlConsumer {
    validator: ModelValidator,
    template: PathBuf,
    annotation: String,
    id_field: String,
    objects: IndexMap<String, ObjectDefinition>,
}

impl GraphQlConsumer {
    /// Create the consumer; a template path is mandatory
    pub fn new(validation: ValidationConfig, options: &GraphQlConfig) -> Result<Self, FatalError> {
        let template = options
            .template
            .clone()
            .ok_or_else(|| FatalError::missing_option(CONSUMER_NAME, "template"))?;

        Ok(Self {
            validator: ModelValidator::new(validation),
            template,
            annotation: options.annotation.clone(),
            id_field: options.id_field.clone(),
            objects: IndexMap::new(),
        })
    }

    pub fn template(&self) -> &Path {
        &self.template
    }

    /// The wrapped validator
    pub fn validator(&self) -> &ModelValidator {
        &self.validator
    }

    /// Object definitions in model order
    pub fn objects(&self) -> &IndexMap<String, ObjectDefinition> {
        &self.objects
    }

    pub fn object(&self, entity: &str) -> Option<&ObjectDefinition> {
        self.objects.get(entity)
    }

    /// Object definitions as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.objects)
    }

    /// Render the configured template file
    pub fn render(&self) -> Result<String, RenderError> {
        let source = std::fs::read_to_string(&self.template)
            .map_err(|e| RenderError::io(&self.template, e))?;
        self.render_template(&source)
    }

    /// Render the given template source with the objects in emission order
    pub fn render_template(&self, source: &str) -> Result<String, RenderError> {
        if !self.is_valid() {
            return Err(RenderError::InvalidModel(self.errors().len()));
        }

        let order = self.validator.emission_order()?;
        let context = SchemaContext {
            id_field: &self.id_field,
            objects: order.iter().filter_map(|name| self.objects.get(name)).collect(),
        };

        tracing::debug!(objects = context.objects.len(), "Rendering GraphQL schema");
        Ok(environment().render_str(source, context.to_minijinja_value())?)
    }

    /// Render the configured template into `output`
    pub fn write(&self, output: &Path) -> Result<(), RenderError> {
        let schema = self.render()?;
        write_output(output, &schema)?;
        tracing::info!(path = %output.display(), "Wrote GraphQL schema");
        Ok(())
    }

    fn reference_field(&mut self, name: &str, target: &str, kind: ReferenceType, description: String) -> FieldDefinition {
        match kind {
            ReferenceType::Single => FieldDefinition {
                name: name.to_string(),
                kind: FieldKind::Single,
                graphql_type: type_name(target),
                description,
                getter: None,
            },
            ReferenceType::List => FieldDefinition {
                name: name.to_string(),
                kind: FieldKind::List,
                graphql_type: format!("new GraphQLList({})", type_name(target)),
                description,
                getter: None,
            },
            ReferenceType::Connection => {
                let connection = connection_type_name(target);
                if let Some(object) = self.objects.get_mut(target) {
                    object.connection = Some(connection.clone());
                }
                FieldDefinition {
                    name: name.to_string(),
                    kind: FieldKind::Connection,
                    graphql_type: connection,
                    description,
                    getter: Some(getter_name(target)),
                }
            }
        }
    }
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);

    env.add_filter("pascal_case", functions::pascal_case);
    env.add_filter("camel_case", functions::camel_case);
    env.add_filter("js_string", functions::js_string);

    env
}

impl Consumer for GraphQlConsumer {
    fn name(&self) -> &str {
        CONSUMER_NAME
    }

    fn init_object(&mut self, entity: &str, config: &EntityDescription) -> Result<(), FatalError> {
        self.validator.init_object(entity, config)?;
        let description = config.description.clone().unwrap_or_default();
        self.objects
            .insert(entity.to_string(), ObjectDefinition::new(entity, description));
        Ok(())
    }

    fn handle_attribute(
        &mut self,
        entity: &str,
        attribute: &str,
        config: &AttributeConfig,
    ) -> Result<(), FatalError> {
        self.validator.handle_attribute(entity, attribute, config)?;

        let attr_type = self
            .validator
            .model()
            .attribute(entity, attribute)
            .map(|normalized| normalized.type_name().to_string())
            .unwrap_or_else(|| config.type_name().to_string());

        if let Some(object) = self.objects.get_mut(entity) {
            object.fields.push(FieldDefinition {
                name: attribute.to_string(),
                kind: FieldKind::Attribute,
                graphql_type: graphql_type(&attr_type).to_string(),
                description: config.description.clone().unwrap_or_default(),
                getter: None,
            });
        }
        Ok(())
    }

    fn handle_reference(
        &mut self,
        entity: &str,
        reference: &str,
        config: &ReferenceConfig,
    ) -> Result<(), FatalError> {
        self.validator.handle_reference(entity, reference, config)?;

        let Some(normalized) = self.validator.model().reference(entity, reference).cloned() else {
            return Ok(());
        };
        if !self.validator.check_target(entity, reference, &normalized.target) {
            return Ok(());
        }

        let kind = normalized.cardinality(&self.annotation);
        let field = self.reference_field(reference, &normalized.target, kind, normalized.description);
        if let Some(object) = self.objects.get_mut(entity) {
            object.fields.push(field);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FatalError> {
        self.validator.finish()
    }

    fn errors(&self) -> &ErrorRecord {
        self.validator.errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metamodel_core::{Category, ModelDescription};
    use metamodel_parser::parse_with;
    use pretty_assertions::assert_eq;

    fn options() -> GraphQlConfig {
        GraphQlConfig {
            template: Some(PathBuf::from("schema.js.jinja")),
            ..GraphQlConfig::default()
        }
    }

    fn consumer_for(json: &str) -> GraphQlConsumer {
        let model = ModelDescription::from_json_str(json).unwrap();
        let mut consumer = GraphQlConsumer::new(ValidationConfig::default(), &options()).unwrap();
        parse_with(&model, &mut consumer).unwrap();
        consumer
    }

    const MODEL: &str = r#"{
        "user": {
            "description": "A user",
            "attributes": { "email": { "in_key_hash": true }, "age": "number", "active": "boolean" },
            "references": {
                "roles": { "target": "role", "annotations": { "graphql": { "reference_type": "connection" } } },
                "groups": { "target": "group", "annotations": { "graphql": { "upper_bound": 10 } } },
                "manager": "group"
            }
        },
        "role": { "attributes": { "name": { "in_key_hash": true } } },
        "group": { "attributes": { "name": { "in_key_hash": true } } }
    }"#;

    #[test]
    fn test_template_is_mandatory() {
        let err = GraphQlConsumer::new(ValidationConfig::default(), &GraphQlConfig::default()).unwrap_err();
        assert_eq!(err, FatalError::missing_option("graphql", "template"));
    }

    #[test]
    fn test_attribute_types_are_mapped() {
        assert_eq!(graphql_type("string"), "GraphQLString");
        assert_eq!(graphql_type("number"), "GraphQLInt");
        assert_eq!(graphql_type("date"), "GraphQLInt");
        assert_eq!(graphql_type("boolean"), "GraphQLBoolean");
        assert_eq!(graphql_type("list"), "new GraphQLList(GraphQLString)");
    }

    #[test]
    fn test_object_definitions() {
        let consumer = consumer_for(MODEL);
        assert!(consumer.is_valid(), "{}", consumer.errors());

        let user = consumer.object("user").unwrap();
        assert_eq!(user.class_name, "User");
        assert_eq!(user.description, "A user");
        assert_eq!(user.field("email").unwrap().graphql_type, "GraphQLString");
        assert_eq!(user.field("age").unwrap().graphql_type, "GraphQLInt");
        assert_eq!(user.field("active").unwrap().graphql_type, "GraphQLBoolean");
        // injected defaults are not declared fields
        assert!(user.field("__id_unique").is_none());
    }

    #[test]
    fn test_reference_fields_follow_cardinality() {
        let consumer = consumer_for(MODEL);
        let user = consumer.object("user").unwrap();

        let roles = user.field("roles").unwrap();
        assert_eq!(roles.kind, FieldKind::Connection);
        assert_eq!(roles.graphql_type, "RoleConnection");
        assert_eq!(roles.getter.as_deref(), Some("getRole"));

        let groups = user.field("groups").unwrap();
        assert_eq!(groups.kind, FieldKind::List);
        assert_eq!(groups.graphql_type, "new GraphQLList(groupType)");

        let manager = user.field("manager").unwrap();
        assert_eq!(manager.kind, FieldKind::Single);
        assert_eq!(manager.graphql_type, "groupType");

        assert_eq!(consumer.object("role").unwrap().connection.as_deref(), Some("RoleConnection"));
        assert_eq!(consumer.object("group").unwrap().connection, None);
    }

    #[test]
    fn test_unknown_target_is_a_reference_error() {
        let consumer = consumer_for(
            r#"{ "user": { "attributes": { "email": { "in_key_hash": true } }, "references": { "owner": "ghost" } } }"#,
        );

        assert_eq!(consumer.errors().count("user", Category::Reference), 1);
        assert_eq!(
            consumer.errors().messages("user", Category::Reference, "owner"),
            ["The reference target 'ghost' is not a defined object".to_string()]
        );
        assert!(consumer.object("user").unwrap().field("owner").is_none());
    }

    #[test]
    fn test_render_in_emission_order() {
        let consumer = consumer_for(MODEL);
        let rendered = consumer
            .render_template("{% for object in objects %}{{ object.name }};{% endfor %}")
            .unwrap();
        assert_eq!(rendered, "role;group;user;");
    }

    #[test]
    fn test_render_filters() {
        let consumer = consumer_for(MODEL);
        let rendered = consumer
            .render_template("{{ 'last_login' | pascal_case }} {{ 'last_login' | camel_case }} {{ \"it's\" | js_string }}")
            .unwrap();
        assert_eq!(rendered, "LastLogin lastLogin it\\'s");
    }

    #[test]
    fn test_invalid_model_is_not_rendered() {
        let consumer = consumer_for(r#"{ "user": { "attributes": { "email": "string" } } }"#);
        let err = consumer.render_template("anything").unwrap_err();
        assert!(matches!(err, RenderError::InvalidModel(1)));
    }

    #[test]
    fn test_cycle_is_a_render_error() {
        let consumer = consumer_for(
            r#"{ "node": { "attributes": { "name": { "in_key_hash": true } }, "references": { "parent": "node" } } }"#,
        );
        assert!(consumer.is_valid());

        let err = consumer.render_template("").unwrap_err();
        match err {
            RenderError::Cycle(cycle) => assert_eq!(cycle.unresolved, vec!["node"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_template_file() {
        let consumer = consumer_for(MODEL);
        assert!(matches!(consumer.render().unwrap_err(), RenderError::Io { .. }));
    }

    #[test]
    fn test_to_json_lists_definitions() {
        let consumer = consumer_for(MODEL);
        let json: serde_json::Value = serde_json::from_str(&consumer.to_json().unwrap()).unwrap();
        assert_eq!(json["user"]["type_name"], "userType");
        assert_eq!(json["role"]["connection"], "RoleConnection");
    }
}
