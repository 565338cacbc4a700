//! Resource URL paths.
//!
//! Every item-level request addresses one of a few shapes relative to the
//! server base URL:
//!
//! - `Type` for create and type-level search
//! - `Type/id` for read, update, patch and delete
//! - `Type/$operation` and `Type/id/$operation` for operations
//! - the base URL itself for `Bundle` transactions
//!
//! # Example
//!
//! ```rust
//! use fhir_client::rest::{resource_path, ResourceOperation};
//! use fhir_client::clients::HttpMethod;
//!
//! assert_eq!(resource_path("Patient", Some("123")), "Patient/123");
//! assert_eq!(resource_path("Bundle", None), "");
//! assert_eq!(ResourceOperation::Patch.default_http_method(), HttpMethod::Patch);
//! ```

use crate::clients::HttpMethod;

/// Operations that can be performed on a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceOperation {
    /// Read a resource by id (GET `Type/id`).
    Read,
    /// Create a resource (POST `Type`).
    Create,
    /// Replace a resource (PUT `Type/id`).
    Update,
    /// Partially update a resource (PATCH `Type/id`).
    Patch,
    /// Delete a resource (DELETE `Type/id`).
    Delete,
}

impl ResourceOperation {
    /// Returns the default HTTP method for this operation.
    #[must_use]
    pub const fn default_http_method(&self) -> HttpMethod {
        match self {
            Self::Read => HttpMethod::Get,
            Self::Create => HttpMethod::Post,
            Self::Update => HttpMethod::Put,
            Self::Patch => HttpMethod::Patch,
            Self::Delete => HttpMethod::Delete,
        }
    }

    /// Returns `true` if the operation addresses an existing resource by id.
    #[must_use]
    pub const fn requires_id(&self) -> bool {
        !matches!(self, Self::Create)
    }
}

/// Builds the path of a resource relative to the base URL.
///
/// `Bundle` resources without an id are posted to the base URL itself
/// (transaction and batch bundles), so their path is empty.
#[must_use]
pub fn resource_path(resource_type: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => format!("{resource_type}/{id}"),
        None if resource_type == "Bundle" => String::new(),
        None => resource_type.to_string(),
    }
}

/// Appends an operation or sub-path (`$validate`, `_history`) to a path.
#[must_use]
pub fn operation_path(base: &str, operation: &str) -> String {
    let operation = operation.trim_start_matches('/');
    if base.is_empty() {
        operation.to_string()
    } else {
        format!("{base}/{operation}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_path_shapes() {
        assert_eq!(resource_path("Patient", None), "Patient");
        assert_eq!(resource_path("Patient", Some("p1")), "Patient/p1");
        assert_eq!(resource_path("Bundle", None), "");
        assert_eq!(resource_path("Bundle", Some("b1")), "Bundle/b1");
    }

    #[test]
    fn test_operation_path() {
        assert_eq!(operation_path("Patient", "$validate"), "Patient/$validate");
        assert_eq!(operation_path("Patient/1", "/_history"), "Patient/1/_history");
        assert_eq!(operation_path("", "$process-message"), "$process-message");
    }

    #[test]
    fn test_operation_methods() {
        assert_eq!(ResourceOperation::Read.default_http_method(), HttpMethod::Get);
        assert_eq!(ResourceOperation::Create.default_http_method(), HttpMethod::Post);
        assert_eq!(ResourceOperation::Update.default_http_method(), HttpMethod::Put);
        assert_eq!(ResourceOperation::Delete.default_http_method(), HttpMethod::Delete);
        assert!(!ResourceOperation::Create.requires_id());
        assert!(ResourceOperation::Delete.requires_id());
    }
}
