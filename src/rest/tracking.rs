//! Dirty tracking for partial updates.
//!
//! This module provides [`DirtyFields`], the set of top-level field names a
//! [`Resource`](crate::Resource) has mutated since it was loaded or last
//! saved. It lets `save_changes` send a PATCH containing only those fields
//! instead of the whole document.
//!
//! # Example
//!
//! ```rust
//! use fhir_client::rest::DirtyFields;
//! use serde_json::json;
//!
//! let mut dirty = DirtyFields::new();
//! dirty.mark("active");
//! dirty.mark("telecom");
//! dirty.mark("active");
//! assert_eq!(dirty.len(), 2);
//!
//! let data = json!({"resourceType": "Patient", "active": false, "name": []});
//! let changes = dirty.extract(data.as_object().unwrap());
//! assert_eq!(changes.get("active"), Some(&json!(false)));
//! // Removed fields are sent as null so the server clears them.
//! assert_eq!(changes.get("telecom"), Some(&json!(null)));
//! assert!(changes.get("name").is_none());
//! ```

use serde_json::{Map, Value};

/// Ordered set of mutated top-level field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyFields {
    fields: Vec<String>,
}

impl DirtyFields {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Marks a field as changed. Marking twice has no further effect.
    pub fn mark(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
    }

    /// Returns `true` if `field` has been marked.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Returns `true` if no field has been marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of marked fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterates over marked fields in the order they were first marked.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Forgets every mark, typically after a successful save.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Collects the current value of every marked field from `data`.
    ///
    /// A marked field missing from `data` is reported as `null`.
    #[must_use]
    pub fn extract(&self, data: &Map<String, Value>) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|field| (field.clone(), data.get(field).cloned().unwrap_or(Value::Null)))
            .collect()
    }
}
