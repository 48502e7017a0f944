//! Run report (stable v1)
//!
//! Written by `metamodel check --report`. Fields are versioned;
//! breaking changes require a new major version.

use serde::{Deserialize, Serialize};

use crate::errors::ErrorRecord;
use crate::model::ModelDescription;

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of entities in the model
    pub entities: usize,

    /// Number of declared attributes
    pub attributes: usize,

    /// Number of declared references
    pub references: usize,

    /// Number of recorded error messages
    pub errors: usize,
}

impl ReportSummary {
    /// Count the declared elements of a model
    pub fn for_model(model: &ModelDescription) -> Self {
        Self {
            entities: model.len(),
            attributes: model.iter().map(|(_, e)| e.attributes.len()).sum(),
            references: model.iter().map(|(_, e)| e.references.len()).sum(),
            errors: 0,
        }
    }
}

/// Outcome of the emission ordering step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OrderOutcome {
    /// Every entity was placed
    Ordered { order: Vec<String> },

    /// Ordering stopped at a cycle
    Cyclic {
        resolved: Vec<String>,
        unresolved: Vec<String>,
    },
}

/// Validation report (report.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Whether the model is valid
    pub valid: bool,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Accumulated validation errors
    pub errors: ErrorRecord,

    /// Emission ordering result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderOutcome>,
}

impl Report {
    /// Create a report for a validated model
    pub fn new(model: &ModelDescription, errors: ErrorRecord) -> Self {
        let mut summary = ReportSummary::for_model(model);
        summary.errors = errors.len();

        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            valid: errors.is_empty(),
            summary,
            errors,
            order: None,
        }
    }

    /// Attach the ordering outcome
    pub fn with_order(mut self, order: OrderOutcome) -> Self {
        self.order = Some(order);
        self
    }

    /// True if the model is valid and could be ordered
    pub fn is_success(&self) -> bool {
        self.valid && !matches!(self.order, Some(OrderOutcome::Cyclic { .. }))
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}
