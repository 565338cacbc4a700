//! Bundle page parsing.
//!
//! Search responses are `Bundle` resources: an ordered `entry` list (each
//! entry wrapping a `resource`), an optional `total`, and `link`s of which
//! the `next` relation drives pagination. [`BundlePage`] extracts those
//! parts and implements `Deref` to its entries.
//!
//! # Example
//!
//! ```rust
//! use fhir_client::rest::BundlePage;
//! use serde_json::json;
//!
//! let page = BundlePage::parse(json!({
//!     "resourceType": "Bundle",
//!     "total": 3,
//!     "link": [
//!         {"relation": "self", "url": "http://localhost/fhir/Patient"},
//!         {"relation": "next", "url": "http://localhost/fhir/Patient?page=2"}
//!     ],
//!     "entry": [
//!         {"resource": {"resourceType": "Patient", "id": "1"}},
//!         {"resource": {"resourceType": "Practitioner", "id": "2"}, "search": {"mode": "include"}}
//!     ]
//! })).unwrap();
//!
//! assert_eq!(page.len(), 2);
//! assert_eq!(page.total(), Some(3));
//! assert_eq!(page.next_link(), Some("http://localhost/fhir/Patient?page=2"));
//! assert_eq!(page.of_type("Patient").count(), 1);
//! ```

use std::ops::Deref;

use serde_json::Value;

use crate::document::{get_by_path, PathStep};
use crate::rest::FhirError;

/// One page of a search result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BundlePage {
    entries: Vec<Value>,
    total: Option<u64>,
    next_link: Option<String>,
}

impl BundlePage {
    /// Parses a `Bundle` response body.
    ///
    /// A missing `entry` list is treated as an empty page. Entries without
    /// a `resource` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidResponse`] if the body is not a JSON
    /// object or declares a `resourceType` other than `Bundle`.
    pub fn parse(mut body: Value) -> Result<Self, FhirError> {
        let Some(object) = body.as_object_mut() else {
            return Err(FhirError::InvalidResponse {
                message: "expected a Bundle object".to_string(),
            });
        };

        match object.get("resourceType").and_then(Value::as_str) {
            None | Some("Bundle") => {}
            Some(other) => {
                return Err(FhirError::InvalidResponse {
                    message: format!("expected a Bundle, got '{other}'"),
                })
            }
        }

        let total = object.get("total").and_then(Value::as_u64);

        let next_path = [
            PathStep::Key("link".to_string()),
            PathStep::from(serde_json::json!({"relation": "next"})),
            PathStep::Key("url".to_string()),
        ];
        let next_link = get_by_path(&body, &next_path)
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        let entries = match body.get_mut("entry").map(Value::take) {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .filter_map(|mut entry| entry.get_mut("resource").map(Value::take))
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            entries,
            total,
            next_link,
        })
    }

    /// Returns the server-reported total, if present.
    #[must_use]
    pub const fn total(&self) -> Option<u64> {
        self.total
    }

    /// Returns the `next` link URL, if there is a following page.
    #[must_use]
    pub fn next_link(&self) -> Option<&str> {
        self.next_link.as_deref()
    }

    /// Iterates over the entries of the given resource type.
    pub fn of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.entries
            .iter()
            .filter(move |entry| is_type(entry, resource_type))
    }

    /// Consumes the page, returning the entries of the given resource type.
    #[must_use]
    pub fn into_type(self, resource_type: &str) -> Vec<Value> {
        self.entries
            .into_iter()
            .filter(|entry| is_type(entry, resource_type))
            .collect()
    }

    /// Consumes the page, returning all entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<Value> {
        self.entries
    }
}

impl Deref for BundlePage {
    type Target = [Value];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

fn is_type(entry: &Value, resource_type: &str) -> bool {
    entry.get("resourceType").and_then(Value::as_str) == Some(resource_type)
}
