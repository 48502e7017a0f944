//! Validation and defaulting engine
//!
//! Normalizes attribute and reference configuration, applies the configured
//! defaults, and accumulates structured errors without ever aborting a pass.

pub mod validator;

pub use validator::ModelValidator;
