//! Metamodel Core
//!
//! Model description types, the accumulated error record, the consumer
//! contract every output target implements, and configuration.

pub mod model;
pub mod errors;
pub mod consumer;
pub mod config;
pub mod report;

pub use model::{
    AttributeConfig, EntityDescription, ModelDescription, ModelError, NormalizedEntity,
    NormalizedModel, NormalizedReference, RawAttribute, RawReference, ReferenceAnnotation,
    ReferenceConfig, ReferenceType,
};
pub use errors::{Category, ErrorRecord, UNKNOWN_ENTITY, WHOLE_ENTITY};
pub use consumer::{Consumer, FatalError};
pub use config::{Config, ConfigError, FlagDefault, FlagKind, GraphQlConfig, TdgConfig, ValidationConfig};
pub use report::{OrderOutcome, Report, ReportSummary, ReportVersion};
