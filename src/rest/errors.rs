//! Error types for FHIR operations.
//!
//! [`FhirError`] is the single error type returned by every client,
//! resource, reference, and search operation.
//!
//! # Error Handling
//!
//! Non-2xx responses are mapped to semantic variants:
//!
//! - **404 / 410**: [`FhirError::ResourceNotFound`]
//! - **412**: [`FhirError::MultipleResourcesFound`] (a conditional operation
//!   matched more than one resource)
//! - **Other 4xx/5xx**: [`FhirError::OperationOutcome`], carrying the
//!   server's `OperationOutcome` when the body is one
//!
//! Transport failures pass through unchanged as [`FhirError::Http`]. Nothing
//! is retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use fhir_client::FhirError;
//!
//! match client.resources("Patient").search("identifier", "mrn|1").get().await {
//!     Ok(patient) => println!("Found {:?}", patient.id()),
//!     Err(FhirError::ResourceNotFound { .. }) => println!("No such patient"),
//!     Err(FhirError::MultipleResourcesFound { .. }) => println!("Ambiguous identifier"),
//!     Err(FhirError::OperationOutcome { outcome, .. }) => println!("Server said {outcome:?}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::clients::{HttpError, HttpResponse};
use crate::document::PathError;
use crate::error::ConfigError;
use crate::search::EncodingError;

/// Error type for FHIR operations.
#[derive(Debug, Error)]
pub enum FhirError {
    /// Zero matches where exactly one was required (HTTP 404/410, or an
    /// empty result for a strict `get`).
    #[error("Resource not found: {message}")]
    ResourceNotFound {
        /// Details from the server or the client.
        message: String,
    },

    /// More than one match where at most one was required (HTTP 412, or
    /// several results for a strict `get`).
    #[error("Multiple resources found: {message}")]
    MultipleResourcesFound {
        /// Details from the server or the client.
        message: String,
    },

    /// The server reported a failure.
    #[error("Operation failed with status {status}: {message}")]
    OperationOutcome {
        /// HTTP status code (0 when raised from a `$validate` result).
        status: u16,
        /// The `OperationOutcome` resource, when the server sent one.
        outcome: Option<Value>,
        /// Issue diagnostics, or the raw response text.
        message: String,
    },

    /// A successful response did not have the expected shape.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// What was wrong with the response.
        message: String,
    },

    /// The operation needs a resource id and none is set.
    #[error("Resource id is required for {operation} operation")]
    MissingId {
        /// The operation being attempted (e.g., "update", "delete").
        operation: &'static str,
    },

    /// A resource of one type was given where another was expected.
    #[error("Expected a '{expected}' resource, got '{found}'")]
    ResourceTypeMismatch {
        /// The expected resource type.
        expected: String,
        /// The resource type that was found.
        found: String,
    },

    /// `resourceType` cannot be changed or removed once set.
    #[error("Cannot change resourceType of a '{resource_type}' resource; create a new resource instead")]
    ImmutableResourceType {
        /// The resource's type.
        resource_type: String,
    },

    /// A search filter could not be encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// A document path could not be resolved.
    #[error(transparent)]
    Path(#[from] PathError),

    /// A transport-level error occurred.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The client configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The blocking runtime could not be started.
    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// A JSON value could not be converted.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FhirError {
    /// Creates a `FhirError` from a non-2xx response.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use fhir_client::FhirError;
    /// use fhir_client::clients::HttpResponse;
    ///
    /// let response = HttpResponse::new(410, HashMap::new(), "");
    /// assert!(matches!(
    ///     FhirError::from_http_response(&response),
    ///     FhirError::ResourceNotFound { .. }
    /// ));
    /// ```
    #[must_use]
    pub fn from_http_response(response: &HttpResponse) -> Self {
        let outcome = response
            .body
            .as_ref()
            .filter(|body| {
                body.get("resourceType").and_then(Value::as_str) == Some("OperationOutcome")
            })
            .cloned();
        let message = outcome
            .as_ref()
            .and_then(outcome_message)
            .unwrap_or_else(|| {
                let text = response.text.trim();
                if text.is_empty() {
                    format!("HTTP {}", response.code)
                } else {
                    text.to_string()
                }
            });

        match response.code {
            404 | 410 => Self::ResourceNotFound { message },
            412 => Self::MultipleResourcesFound { message },
            status => Self::OperationOutcome {
                status,
                outcome,
                message,
            },
        }
    }

    /// Creates an [`FhirError::OperationOutcome`] from a `$validate` result.
    pub(crate) fn from_outcome(outcome: Value) -> Self {
        let message = outcome_message(&outcome).unwrap_or_else(|| "validation failed".to_string());
        Self::OperationOutcome {
            status: 0,
            outcome: Some(outcome),
            message,
        }
    }

    /// Returns the server's `OperationOutcome`, if one was received.
    #[must_use]
    pub const fn outcome(&self) -> Option<&Value> {
        match self {
            Self::OperationOutcome { outcome, .. } => outcome.as_ref(),
            _ => None,
        }
    }

    /// Returns `true` for errors raised because nothing matched.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound { .. })
    }
}

/// Joins the diagnostics (or `details.text`) of every issue.
fn outcome_message(outcome: &Value) -> Option<String> {
    let messages: Vec<&str> = outcome
        .get("issue")?
        .as_array()?
        .iter()
        .filter_map(|issue| {
            issue
                .get("diagnostics")
                .and_then(Value::as_str)
                .or_else(|| issue.pointer("/details/text").and_then(Value::as_str))
        })
        .collect();

    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}
