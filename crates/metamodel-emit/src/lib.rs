//! Output target consumers
//!
//! This crate handles:
//! - Building GraphQL/Relay object definitions and rendering them through a template
//! - Building the test-data-generator import configuration
//! - Naming helpers and template filters shared by the generators

pub mod context;
pub mod functions;
pub mod graphql;
pub mod tdg;

pub use context::{FieldDefinition, FieldKind, ObjectDefinition, SchemaContext};
pub use graphql::{GraphQlConsumer, RenderError, BUNDLED_TEMPLATE};
pub use tdg::{TdgConsumer, TdgEdge, TdgModel, TdgVertex, TimeShift};
