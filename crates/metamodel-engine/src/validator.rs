//! Attribute and reference validation with defaulting
//!
//! `ModelValidator` is the base consumer: it normalizes every element it is
//! handed, applies the configured defaults, records problems in its error
//! record and contributes dependency edges for emission ordering. Output
//! target consumers wrap it and build on its normalized model.

use metamodel_core::{
    AttributeConfig, Consumer, EntityDescription, ErrorRecord, FatalError, NormalizedEntity,
    NormalizedModel, NormalizedReference, ReferenceConfig, ValidationConfig,
};
use metamodel_core::model::{value_text, DEFAULT_ATTRIBUTE_TYPE};
use metamodel_parser::{CycleDetected, DependencyGraph, NodeId};
use serde_json::Value;

/// Validating, defaulting consumer
#[derive(Debug, Clone)]
pub struct ModelValidator {
    /// Type, flag and default-attribute tables
    config: ValidationConfig,

    /// The model built so far
    model: NormalizedModel,

    /// Errors found so far
    errors: ErrorRecord,

    /// Entity dependencies contributed by references
    dependencies: DependencyGraph,
}

impl ModelValidator {
    /// Create a validator with the given tables
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            model: NormalizedModel::new(),
            errors: ErrorRecord::new(),
            dependencies: DependencyGraph::new(),
        }
    }

    /// Create a validator with the built-in tables
    pub fn with_defaults() -> Self {
        Self::new(ValidationConfig::default())
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// The normalized model built so far
    pub fn model(&self) -> &NormalizedModel {
        &self.model
    }

    /// Mutable access for consumers recording their own findings
    pub fn errors_mut(&mut self) -> &mut ErrorRecord {
        &mut self.errors
    }

    /// Dependencies contributed by the references handled so far
    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    /// Emission order of all entities seen so far
    pub fn emission_order(&self) -> Result<Vec<NodeId>, CycleDetected> {
        self.dependencies.compute_order().map_err(|err| {
            tracing::warn!(
                resolved = err.resolved.len(),
                unresolved = err.unresolved.len(),
                "Could not order entities"
            );
            err
        })
    }

    /// Validate and default a single attribute configuration
    ///
    /// Never fails: an unknown type or a flag of the wrong kind is recorded
    /// and normalization carries on. Running it again on its own output
    /// changes nothing and records nothing new.
    pub fn normalize_attribute(
        &mut self,
        entity: &str,
        attribute: &str,
        raw: &AttributeConfig,
    ) -> AttributeConfig {
        let mut normalized = raw.clone();
        self.validate_type(entity, attribute, &mut normalized);
        self.apply_flag_defaults(entity, attribute, &mut normalized);
        normalized
    }

    /// Normalize a reference configuration
    ///
    /// Returns `None` (after recording an error) when no usable target is
    /// named. Whether the target exists is left to output consumers.
    pub fn normalize_reference(
        &mut self,
        entity: &str,
        reference: &str,
        raw: &ReferenceConfig,
    ) -> Option<NormalizedReference> {
        for (namespace, annotation) in &raw.annotations {
            if let Err(value) = annotation.parsed_type() {
                self.errors.reference(
                    entity,
                    reference,
                    format!(
                        "The reference type '{value}' in annotation '{namespace}' is not valid, expected one of 'single', 'list', 'connection'"
                    ),
                );
            }
            if let Err(value) = annotation.parsed_upper_bound() {
                self.errors.reference(
                    entity,
                    reference,
                    format!("The upper bound '{value}' in annotation '{namespace}' must be of type 'number'"),
                );
            }
        }

        let target = match &raw.target {
            Some(Value::String(target)) if !target.is_empty() => target,
            None | Some(Value::Null) | Some(Value::String(_)) => {
                self.errors.reference(entity, reference, "No reference target defined");
                return None;
            }
            Some(other) => {
                self.errors.reference(
                    entity,
                    reference,
                    format!("The reference target '{}' is not valid", value_text(other)),
                );
                return None;
            }
        };

        Some(NormalizedReference {
            target: target.to_string(),
            description: raw.description.clone().unwrap_or_default(),
            annotations: raw.annotations.clone(),
        })
    }

    /// Run the full pipeline for a single entity and return its normalized form
    pub fn normalize_entity(
        &mut self,
        entity: &str,
        raw: &EntityDescription,
    ) -> Result<NormalizedEntity, FatalError> {
        self.init_object(entity, raw)?;
        for (attribute, config) in &raw.attributes {
            self.handle_attribute(entity, attribute, &config.to_config())?;
        }
        for (reference, config) in &raw.references {
            self.handle_reference(entity, reference, &config.to_config())?;
        }
        self.validate_entity(entity);

        Ok(self.model.get(entity).cloned().unwrap_or_default())
    }

    /// Check that the entity has at least one key attribute
    ///
    /// Must run after defaulting, which is what settles `in_key_hash`.
    pub fn validate_entity(&mut self, entity: &str) {
        let has_key = self
            .model
            .get(entity)
            .map(NormalizedEntity::has_key_attribute)
            .unwrap_or(false);

        if !has_key {
            self.errors.object(
                entity,
                "The object has no attribute which has 'in_key_hash' set to 'true'",
            );
        }
    }

    /// Record a reference error if `target` is not an entity of the model
    ///
    /// Only meaningful once every entity has been initialized.
    pub fn check_target(&mut self, entity: &str, reference: &str, target: &str) -> bool {
        if self.model.contains(target) {
            return true;
        }
        self.errors.reference(
            entity,
            reference,
            format!("The reference target '{target}' is not a defined object"),
        );
        false
    }

    /// Check every reference of the model against its entities
    ///
    /// Returns the number of references whose target is unknown.
    pub fn check_targets(&mut self) -> usize {
        let references: Vec<(String, String, String)> = self
            .model
            .iter()
            .flat_map(|(entity, normalized)| {
                normalized.references.iter().map(move |(reference, config)| {
                    (entity.clone(), reference.clone(), config.target.clone())
                })
            })
            .collect();

        references
            .iter()
            .filter(|(entity, reference, target)| !self.check_target(entity, reference, target))
            .count()
    }

    fn validate_type(&mut self, entity: &str, attribute: &str, config: &mut AttributeConfig) {
        match &config.attr_type {
            None => config.attr_type = Some(Value::from(DEFAULT_ATTRIBUTE_TYPE)),
            Some(Value::String(attr_type)) if self.config.is_valid_type(attr_type) => {}
            Some(attr_type) => {
                self.errors.attribute(
                    entity,
                    attribute,
                    format!("The given type '{}' is not valid", value_text(attr_type)),
                );
            }
        }
    }

    fn apply_flag_defaults(&mut self, entity: &str, attribute: &str, config: &mut AttributeConfig) {
        for (flag, default) in &self.config.flags {
            match config.flags.get(flag) {
                None => {
                    config.flags.insert(flag.clone(), default.value.clone());
                }
                Some(value) if !default.kind.matches(value) => {
                    self.errors.attribute(
                        entity,
                        attribute,
                        format!("The config element '{flag}' must be of type '{}'", default.kind),
                    );
                }
                Some(_) => {}
            }
        }
    }

    /// Entity entry for an attribute or reference
    ///
    /// An entity the parser never announced through `init_object` is
    /// recorded as an object error and registered as a graph node, without
    /// default attributes.
    fn entity_entry(&mut self, entity: &str) -> &mut NormalizedEntity {
        if !self.model.entities.contains_key(entity) {
            tracing::warn!(entity, "Element handled before its object was initialized");
            self.errors.object(entity, "The object was not initialized before its elements were handled");
            self.dependencies.add_node(entity);
        }
        self.model.entities.entry(entity.to_string()).or_default()
    }

    fn inject_default_attributes(&mut self, entity: &str, config: &EntityDescription) {
        let Some(normalized) = self.model.get_mut(entity) else {
            return;
        };

        for (name, attribute) in &self.config.default_attributes {
            if config.declares_attribute(name) {
                self.errors.attribute(
                    entity,
                    name,
                    format!("The object has an attribute '{name}' which collides with a default attribute"),
                );
            } else {
                normalized.attributes.insert(name.clone(), attribute.clone());
            }
        }
    }
}

impl Default for ModelValidator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Consumer for ModelValidator {
    fn name(&self) -> &str {
        "validator"
    }

    fn init_object(&mut self, entity: &str, config: &EntityDescription) -> Result<(), FatalError> {
        if entity.is_empty() {
            return Err(FatalError::MissingEntityName);
        }

        let normalized = NormalizedEntity {
            description: config.description.clone().unwrap_or_default(),
            ..NormalizedEntity::default()
        };
        self.model.entities.insert(entity.to_string(), normalized);
        self.dependencies.add_node(entity);
        self.inject_default_attributes(entity, config);

        Ok(())
    }

    fn handle_attribute(
        &mut self,
        entity: &str,
        attribute: &str,
        config: &AttributeConfig,
    ) -> Result<(), FatalError> {
        if entity.is_empty() {
            return Err(FatalError::MissingEntityName);
        }
        if attribute.is_empty() {
            return Err(FatalError::MissingAttributeName { entity: entity.to_string() });
        }

        let normalized = self.normalize_attribute(entity, attribute, config);
        self.entity_entry(entity)
            .attributes
            .insert(attribute.to_string(), normalized);

        Ok(())
    }

    fn handle_reference(
        &mut self,
        entity: &str,
        reference: &str,
        config: &ReferenceConfig,
    ) -> Result<(), FatalError> {
        if entity.is_empty() {
            return Err(FatalError::MissingEntityName);
        }
        if reference.is_empty() {
            return Err(FatalError::MissingReferenceName { entity: entity.to_string() });
        }

        if let Some(normalized) = self.normalize_reference(entity, reference, config) {
            let target = normalized.target.clone();
            self.entity_entry(entity)
                .references
                .insert(reference.to_string(), normalized);
            self.dependencies.record_dependency(entity, target);
        }

        Ok(())
    }

    fn finish(&mut self) -> Result<(), FatalError> {
        let entities: Vec<String> = self.model.entities.keys().cloned().collect();
        for entity in entities {
            self.validate_entity(&entity);
        }
        Ok(())
    }

    fn errors(&self) -> &ErrorRecord {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metamodel_core::model::{IN_CONTENT_HASH, IN_KEY_HASH, NULLABLE};
    use metamodel_core::{Category, ReferenceAnnotation, WHOLE_ENTITY};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn validator() -> ModelValidator {
        ModelValidator::with_defaults()
    }

    #[test]
    fn missing_type_defaults_to_string() {
        let mut v = validator();
        let normalized = v.normalize_attribute("user", "email", &AttributeConfig::default());

        assert_eq!(normalized.attr_type, Some(json!("string")));
        assert!(v.errors().is_empty());
    }

    #[test]
    fn invalid_type_is_recorded_and_normalization_continues() {
        let mut v = validator();
        let normalized = v.normalize_attribute("user", "email", &AttributeConfig::of_type("text"));

        assert_eq!(normalized.attr_type, Some(json!("text")));
        assert_eq!(normalized.flag_bool(NULLABLE), Some(true));
        assert_eq!(v.errors().count("user", Category::Attribute), 1);
        assert_eq!(
            v.errors().messages("user", Category::Attribute, "email"),
            ["The given type 'text' is not valid"]
        );
    }

    #[test]
    fn non_string_type_is_recorded() {
        let mut v = validator();
        let raw = AttributeConfig {
            attr_type: Some(json!(5)),
            ..AttributeConfig::default()
        };
        let normalized = v.normalize_attribute("user", "age", &raw);

        assert_eq!(normalized.attr_type, Some(json!(5)));
        assert_eq!(normalized.flag_bool(NULLABLE), Some(true));
        assert_eq!(
            v.errors().messages("user", Category::Attribute, "age"),
            ["The given type '5' is not valid"]
        );
    }

    #[test]
    fn flags_are_defaulted() {
        let mut v = validator();
        let normalized = v.normalize_attribute("user", "email", &AttributeConfig::of_type("string"));

        assert_eq!(normalized.flag(IN_CONTENT_HASH), Some(&json!(true)));
        assert_eq!(normalized.flag(IN_KEY_HASH), Some(&json!(false)));
        assert_eq!(normalized.flag(NULLABLE), Some(&json!(true)));
    }

    #[test]
    fn explicit_flags_are_kept() {
        let mut v = validator();
        let raw = AttributeConfig::of_type("string")
            .with_flag(IN_KEY_HASH, true)
            .with_flag(NULLABLE, false);
        let normalized = v.normalize_attribute("user", "email", &raw);

        assert_eq!(normalized.flag(IN_KEY_HASH), Some(&json!(true)));
        assert_eq!(normalized.flag(NULLABLE), Some(&json!(false)));
        assert!(v.errors().is_empty());
    }

    #[test]
    fn malformed_flag_is_recorded_and_left_in_place() {
        let mut v = validator();
        let raw = AttributeConfig::of_type("string").with_flag(IN_KEY_HASH, "yes");
        let normalized = v.normalize_attribute("user", "email", &raw);

        assert_eq!(normalized.flag(IN_KEY_HASH), Some(&json!("yes")));
        assert_eq!(
            v.errors().messages("user", Category::Attribute, "email"),
            ["The config element 'in_key_hash' must be of type 'boolean'"]
        );
    }

    #[test]
    fn defaulting_is_idempotent() {
        let mut v = validator();
        let raw = AttributeConfig::of_type("text")
            .with_flag(NULLABLE, 3)
            .with_flag(IN_KEY_HASH, true);

        let once = v.normalize_attribute("user", "email", &raw);
        let errors_after_once = v.errors().clone();
        let twice = v.normalize_attribute("user", "email", &once);

        assert_eq!(once, twice);
        assert_eq!(v.errors(), &errors_after_once);
        assert_eq!(v.errors().len(), 2);
    }

    #[test]
    fn unknown_keys_survive_normalization() {
        let mut v = validator();
        let raw = AttributeConfig::of_type("string").with_flag("unique", true);
        let normalized = v.normalize_attribute("user", "email", &raw);

        assert_eq!(normalized.flag("unique"), Some(&json!(true)));
        assert!(v.errors().is_empty());
    }

    #[test]
    fn default_attributes_are_injected() {
        let mut v = validator();
        let entity = v
            .normalize_entity(
                "user",
                &EntityDescription::new().with_attribute(
                    "email",
                    AttributeConfig::of_type("string").with_flag(IN_KEY_HASH, true),
                ),
            )
            .unwrap();

        let names: Vec<&String> = entity.attributes.keys().collect();
        assert_eq!(names, vec!["__id_unique", "__id_hash", "__content_hash", "email"]);
        assert_eq!(entity.attributes["__id_unique"].type_name(), "number");
        assert!(v.is_valid());
    }

    #[test]
    fn default_attribute_collision_keeps_user_value() {
        let mut v = validator();
        let user_hash = AttributeConfig::of_type("number").with_flag(IN_KEY_HASH, true);
        let entity = v
            .normalize_entity(
                "user",
                &EntityDescription::new().with_attribute("__id_hash", user_hash),
            )
            .unwrap();

        let kept = &entity.attributes["__id_hash"];
        assert_eq!(kept.type_name(), "number");
        assert!(kept.in_key_hash());
        assert_eq!(v.errors().count("user", Category::Attribute), 1);
        assert_eq!(v.errors().count("user", Category::Object), 0);
    }

    #[test]
    fn entity_without_key_attribute_gets_one_object_error() {
        let mut v = validator();
        v.normalize_entity("user", &EntityDescription::new().with_attribute("email", "string"))
            .unwrap();

        assert_eq!(v.errors().count("user", Category::Object), 1);
        assert_eq!(v.errors().len(), 1);
        assert!(!v.is_valid());

        v.validate_entity("user");
        assert_eq!(v.errors().messages("user", Category::Object, WHOLE_ENTITY).len(), 1);
    }

    #[test]
    fn key_check_sees_defaulted_flags() {
        // in_key_hash defaults to true here, so an attribute without the flag satisfies the check
        let mut flags = ValidationConfig::default().flags;
        flags[IN_KEY_HASH].value = json!(true);
        let mut v = ModelValidator::new(ValidationConfig::default().with_flags(flags));

        v.normalize_entity("user", &EntityDescription::new().with_attribute("email", "string"))
            .unwrap();
        assert!(v.is_valid());
    }

    #[test]
    fn reference_without_target_is_recorded() {
        let mut v = validator();
        let normalized = v.normalize_reference("user", "owner", &ReferenceConfig::default());

        assert!(normalized.is_none());
        assert_eq!(
            v.errors().messages("user", Category::Reference, "owner"),
            ["No reference target defined"]
        );
    }

    #[test]
    fn invalid_reference_type_is_recorded() {
        let mut v = validator();
        let raw = ReferenceConfig::to("role").with_annotation(
            "graphql",
            ReferenceAnnotation {
                upper_bound: Some(json!(3)),
                reference_type: Some(json!("graph")),
            },
        );
        let normalized = v.normalize_reference("user", "roles", &raw).unwrap();

        assert_eq!(normalized.target, "role");
        assert_eq!(v.errors().count("user", Category::Reference), 1);
    }

    #[test]
    fn malformed_target_and_upper_bound_are_recorded() {
        let mut v = validator();
        let raw = ReferenceConfig {
            target: Some(json!(["role"])),
            ..ReferenceConfig::default()
        }
        .with_annotation(
            "tdg",
            ReferenceAnnotation {
                upper_bound: Some(json!("ten")),
                reference_type: None,
            },
        );

        assert!(v.normalize_reference("user", "roles", &raw).is_none());
        assert_eq!(
            v.errors().messages("user", Category::Reference, "roles"),
            [
                "The upper bound 'ten' in annotation 'tdg' must be of type 'number'",
                "The reference target '[\"role\"]' is not valid",
            ]
        );
    }

    #[test]
    fn references_contribute_dependencies() {
        let mut v = validator();
        v.init_object("user", &EntityDescription::new()).unwrap();
        v.init_object("account", &EntityDescription::new()).unwrap();
        v.handle_reference("user", "account", &ReferenceConfig::to("account"))
            .unwrap();

        assert_eq!(v.dependencies().dependencies("user"), vec!["account"]);
        assert_eq!(v.emission_order().unwrap(), vec!["account", "user"]);
        assert_eq!(v.model().reference("user", "account").unwrap().target, "account");
    }

    #[test]
    fn elements_of_uninitialized_entity_are_recorded() {
        let mut v = validator();
        v.init_object("account", &EntityDescription::new()).unwrap();
        v.handle_attribute(
            "user",
            "email",
            &AttributeConfig::of_type("string").with_flag(IN_KEY_HASH, true),
        )
        .unwrap();
        v.handle_reference("user", "account", &ReferenceConfig::to("account"))
            .unwrap();

        assert_eq!(
            v.errors().messages("user", Category::Object, WHOLE_ENTITY),
            ["The object was not initialized before its elements were handled"]
        );
        assert!(v.dependencies().nodes().iter().any(|node| node.as_str() == "user"));
        assert_eq!(v.emission_order().unwrap(), vec!["account", "user"]);

        // no default attributes without init_object
        let names: Vec<&String> = v.model().get("user").unwrap().attributes.keys().collect();
        assert_eq!(names, vec!["email"]);
    }

    #[test]
    fn unknown_targets_are_recorded() {
        let mut v = validator();
        v.init_object("user", &EntityDescription::new()).unwrap();
        v.init_object("account", &EntityDescription::new()).unwrap();
        v.handle_reference("user", "account", &ReferenceConfig::to("account"))
            .unwrap();
        v.handle_reference("user", "group", &ReferenceConfig::to("group"))
            .unwrap();

        assert_eq!(v.check_targets(), 1);
        assert_eq!(
            v.errors().messages("user", Category::Reference, "group"),
            ["The reference target 'group' is not a defined object"]
        );
        assert_eq!(v.errors().count("user", Category::Reference), 1);

        // the unknown target keeps its source out of the order
        let cycle = v.emission_order().unwrap_err();
        assert_eq!(cycle.unresolved, vec!["user"]);
    }

    #[test]
    fn missing_names_are_fatal() {
        let mut v = validator();
        assert_eq!(
            v.init_object("", &EntityDescription::new()),
            Err(FatalError::MissingEntityName)
        );
        assert_eq!(
            v.handle_attribute("user", "", &AttributeConfig::default()),
            Err(FatalError::MissingAttributeName { entity: "user".to_string() })
        );
        assert_eq!(
            v.handle_reference("user", "", &ReferenceConfig::default()),
            Err(FatalError::MissingReferenceName { entity: "user".to_string() })
        );
    }
}
