//! Broadcast visitor
//!
//! Walks a model description in three full passes (entities, attributes,
//! references) and calls every registered consumer for each element, in
//! registration order. Some consumers resolve references against the full
//! set of entities and attributes, so a pass always completes for every
//! entity before the next pass begins.

use metamodel_core::{Consumer, FatalError, ModelDescription};

/// Dispatches a model description to an ordered set of consumers
pub struct ModelParser<'a> {
    consumers: Vec<&'a mut dyn Consumer>,
}

impl<'a> ModelParser<'a> {
    /// Create a parser with no consumers
    pub fn new() -> Self {
        Self { consumers: Vec::new() }
    }

    /// Register a consumer; consumers are called in registration order
    pub fn register(&mut self, consumer: &'a mut dyn Consumer) -> &mut Self {
        self.consumers.push(consumer);
        self
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_consumer(mut self, consumer: &'a mut dyn Consumer) -> Self {
        self.consumers.push(consumer);
        self
    }

    /// Number of registered consumers
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Parse the model, calling every consumer for every element
    ///
    /// Validation problems are left in each consumer's error record; only
    /// fatal setup errors stop the parse.
    pub fn parse(&mut self, model: &ModelDescription) -> Result<(), FatalError> {
        tracing::info!(
            entities = model.len(),
            consumers = self.consumers.len(),
            "Parsing model"
        );

        for (entity, config) in model.iter() {
            if entity.is_empty() {
                return Err(FatalError::MissingEntityName);
            }
            for consumer in self.consumers.iter_mut() {
                tracing::debug!(consumer = consumer.name(), "Init object '{}'", entity);
                consumer.init_object(entity, config)?;
            }
        }

        for (entity, config) in model.iter() {
            for (attribute, raw) in &config.attributes {
                if attribute.is_empty() {
                    return Err(FatalError::MissingAttributeName { entity: entity.clone() });
                }
                let attr_config = raw.to_config();
                for consumer in self.consumers.iter_mut() {
                    tracing::debug!(consumer = consumer.name(), "Handle attribute '{}'->'{}'", entity, attribute);
                    consumer.handle_attribute(entity, attribute, &attr_config)?;
                }
            }
        }

        for (entity, config) in model.iter() {
            for (reference, raw) in &config.references {
                if reference.is_empty() {
                    return Err(FatalError::MissingReferenceName { entity: entity.clone() });
                }
                let ref_config = raw.to_config();
                for consumer in self.consumers.iter_mut() {
                    tracing::debug!(consumer = consumer.name(), "Handle reference '{}'->'{}'", entity, reference);
                    consumer.handle_reference(entity, reference, &ref_config)?;
                }
            }
        }

        for consumer in self.consumers.iter_mut() {
            consumer.finish()?;
            if !consumer.is_valid() {
                tracing::info!(
                    consumer = consumer.name(),
                    errors = consumer.errors().len(),
                    "Model has validation errors"
                );
            }
        }

        Ok(())
    }
}

impl Default for ModelParser<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a model with a single consumer
pub fn parse_with(model: &ModelDescription, consumer: &mut dyn Consumer) -> Result<(), FatalError> {
    ModelParser::new().with_consumer(consumer).parse(model)
}
