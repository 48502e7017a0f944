//! Accumulated validation errors
//!
//! Validation never aborts a pass. Problems are filed here as
//! entity -> category -> item -> messages and queried once the pass is done.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity key used for errors that cannot be attributed to an entity
pub const UNKNOWN_ENTITY: &str = "__UNKNOWN_OBJECTS__";

/// Item name used for errors concerning the entity as a whole
pub const WHOLE_ENTITY: &str = "-";

/// The part of an entity an error is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// An attribute of the entity
    Attribute,

    /// A reference of the entity
    Reference,

    /// The entity itself
    Object,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attribute => "attribute",
            Self::Reference => "reference",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

type ItemErrors = IndexMap<String, Vec<String>>;
type EntityErrors = IndexMap<Category, ItemErrors>;

/// Structured error accumulation
///
/// Recording the same message twice for the same item is a no-op, so
/// re-validating already normalized configuration does not duplicate entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorRecord {
    entries: IndexMap<String, EntityErrors>,
}

impl ErrorRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. `entity` of `None` (or empty) files it under [`UNKNOWN_ENTITY`].
    ///
    /// Returns `false` if the identical message was already recorded.
    pub fn record(
        &mut self,
        entity: Option<&str>,
        category: Category,
        item: &str,
        message: impl Into<String>,
    ) -> bool {
        let entity = match entity {
            Some(name) if !name.is_empty() => name,
            _ => UNKNOWN_ENTITY,
        };
        let message = message.into();

        let messages = self
            .entries
            .entry(entity.to_string())
            .or_default()
            .entry(category)
            .or_default()
            .entry(item.to_string())
            .or_default();

        if messages.contains(&message) {
            return false;
        }
        messages.push(message);
        true
    }

    /// Record an error against an attribute
    pub fn attribute(&mut self, entity: &str, attribute: &str, message: impl Into<String>) -> bool {
        self.record(Some(entity), Category::Attribute, attribute, message)
    }

    /// Record an error against a reference
    pub fn reference(&mut self, entity: &str, reference: &str, message: impl Into<String>) -> bool {
        self.record(Some(entity), Category::Reference, reference, message)
    }

    /// Record an error against the entity as a whole
    pub fn object(&mut self, entity: &str, message: impl Into<String>) -> bool {
        self.record(Some(entity), Category::Object, WHOLE_ENTITY, message)
    }

    /// True if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of messages
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .flat_map(|categories| categories.values())
            .flat_map(|items| items.values())
            .map(Vec::len)
            .sum()
    }

    /// Number of messages for an entity in a category
    pub fn count(&self, entity: &str, category: Category) -> usize {
        self.entries
            .get(entity)
            .and_then(|categories| categories.get(&category))
            .map(|items| items.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// Messages recorded for one item
    pub fn messages(&self, entity: &str, category: Category, item: &str) -> &[String] {
        self.entries
            .get(entity)
            .and_then(|categories| categories.get(&category))
            .and_then(|items| items.get(item))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entities with at least one error, in recording order
    pub fn entities(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Flatten into `(entity, category, item, message)` rows
    pub fn iter(&self) -> impl Iterator<Item = (&str, Category, &str, &str)> {
        self.entries.iter().flat_map(|(entity, categories)| {
            categories.iter().flat_map(move |(category, items)| {
                items.iter().flat_map(move |(item, messages)| {
                    messages
                        .iter()
                        .map(move |message| (entity.as_str(), *category, item.as_str(), message.as_str()))
                })
            })
        })
    }

    /// Append all entries of another record
    pub fn extend_from(&mut self, other: &ErrorRecord) {
        for (entity, category, item, message) in other.iter() {
            self.record(Some(entity), category, item, message);
        }
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Renders the record as a tab-indented tree
impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (entity, categories) in &self.entries {
            writeln!(f, "{entity}")?;
            for (category, items) in categories {
                writeln!(f, "\t{category}")?;
                for (item, messages) in items {
                    writeln!(f, "\t\t{item}")?;
                    for message in messages {
                        writeln!(f, "\t\t\t{message}")?;
                    }
                }
            }
        }
        Ok(())
    }
}
