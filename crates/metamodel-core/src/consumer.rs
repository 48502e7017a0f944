//! Consumer contract
//!
//! A consumer receives every entity, attribute and reference of a model in a
//! fixed order and builds whatever it needs from them. Validation problems go
//! into the consumer's own [`ErrorRecord`]; only missing mandatory setup is
//! raised as a [`FatalError`].

use crate::errors::ErrorRecord;
use crate::model::{AttributeConfig, EntityDescription, ReferenceConfig};

/// Handler invoked by the model parser for each element of a model
pub trait Consumer {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Called once per entity before any attribute is handled
    fn init_object(&mut self, entity: &str, config: &EntityDescription) -> Result<(), FatalError>;

    /// Called once per attribute with the expanded (never shorthand) configuration
    fn handle_attribute(
        &mut self,
        entity: &str,
        attribute: &str,
        config: &AttributeConfig,
    ) -> Result<(), FatalError>;

    /// Called once per reference with the expanded (never shorthand) configuration
    fn handle_reference(
        &mut self,
        entity: &str,
        reference: &str,
        config: &ReferenceConfig,
    ) -> Result<(), FatalError>;

    /// Called once after all references have been handled
    fn finish(&mut self) -> Result<(), FatalError> {
        Ok(())
    }

    /// Errors accumulated so far
    fn errors(&self) -> &ErrorRecord;

    /// A model is valid iff no error was recorded
    fn is_valid(&self) -> bool {
        self.errors().is_empty()
    }
}

/// Missing mandatory setup; stops the pipeline at the call site
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    #[error("No entity name defined")]
    MissingEntityName,

    #[error("No attribute name defined for entity '{entity}'")]
    MissingAttributeName { entity: String },

    #[error("No reference name defined for entity '{entity}'")]
    MissingReferenceName { entity: String },

    #[error("Consumer '{consumer}' requires option '{option}'")]
    MissingOption { consumer: String, option: String },
}

impl FatalError {
    pub fn missing_option(consumer: impl Into<String>, option: impl Into<String>) -> Self {
        Self::MissingOption {
            consumer: consumer.into(),
            option: option.into(),
        }
    }
}
