//! Model parsing and dependency ordering
//!
//! This crate handles:
//! - Dispatching a model description to consumers in three ordered passes
//! - Building the entity dependency graph
//! - Computing a stable emission order, with cycle detection

pub mod dispatch;
pub mod order;

pub use dispatch::{parse_with, ModelParser};
pub use order::{compute_order, CycleDetected, DependencyGraph, NodeId};
