//! Test-data-generator import configuration
//!
//! Every entity becomes a vertex and every reference an edge keyed
//! `<entity>.<reference>`. Upper bounds come from the `tdg` annotation
//! namespace unless configured otherwise.

use crate::graphql::{write_output, RenderError};
use indexmap::IndexMap;
use metamodel_core::{
    AttributeConfig, Consumer, EntityDescription, ErrorRecord, FatalError, ReferenceConfig,
    TdgConfig, ValidationConfig,
};
use metamodel_engine::ModelValidator;
use serde::Serialize;
use std::path::Path;

/// Generator input
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TdgModel {
    pub vertices: IndexMap<String, TdgVertex>,
    pub edges: IndexMap<String, TdgEdge>,
    pub time_shift: TimeShift,
}

/// One vertex per entity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TdgVertex {
    pub description: String,

    /// Attribute name -> attribute type
    pub attributes: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TdgEdge {
    pub source: String,
    pub target: String,
    pub description: String,

    /// Maximum number of target records per source record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<i64>,
}

/// How often the generator repeats the data set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeShift {
    pub iterations: u32,
}

/// Consumer building the generator import configuration
#[derive(Debug, Clone)]
pub struct TdgConsumer {
    validator: ModelValidator,
    annotation: String,
    output: TdgModel,
}

impl TdgConsumer {
    pub fn new(validation: ValidationConfig, options: &TdgConfig) -> Self {
        Self {
            validator: ModelValidator::new(validation),
            annotation: options.annotation.clone(),
            output: TdgModel {
                time_shift: TimeShift { iterations: options.iterations },
                ..TdgModel::default()
            },
        }
    }

    /// The wrapped validator
    pub fn validator(&self) -> &ModelValidator {
        &self.validator
    }

    pub fn output(&self) -> &TdgModel {
        &self.output
    }

    /// Pretty-printed generator configuration
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.output)
    }

    /// Write the configuration; an invalid model is not written
    pub fn write(&self, path: &Path) -> Result<(), RenderError> {
        if !self.is_valid() {
            return Err(RenderError::InvalidModel(self.errors().len()));
        }
        write_output(path, &self.to_json()?)?;
        tracing::info!(path = %path.display(), "Wrote test data generator config");
        Ok(())
    }
}

impl Consumer for TdgConsumer {
    fn name(&self) -> &str {
        "tdg"
    }

    fn init_object(&mut self, entity: &str, config: &EntityDescription) -> Result<(), FatalError> {
        self.validator.init_object(entity, config)?;
        self.output.vertices.insert(
            entity.to_string(),
            TdgVertex {
                description: config.description.clone().unwrap_or_default(),
                attributes: IndexMap::new(),
            },
        );
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
        if let Some(vertex) = self.output.vertices.get_mut(entity) {
            vertex.attributes.insert(attribute.to_string(), attr_type);
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

        self.output.edges.insert(
            format!("{entity}.{reference}"),
            TdgEdge {
                source: entity.to_string(),
                upper_bound: normalized.upper_bound(&self.annotation),
                target: normalized.target,
                description: normalized.description,
            },
        );
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FatalError> {
        self.validator.finish()
    }

    fn errors(&self) -> &ErrorRecord {
        self.validator.errors()
    }
}
