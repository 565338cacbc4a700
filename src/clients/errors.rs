//! HTTP-specific error types for the FHIR client.
//!
//! This module contains the transport-level failures surfaced by
//! [`HttpClient`](crate::clients::HttpClient). Non-2xx responses are not
//! errors at this layer; they are mapped to typed failures by
//! [`FhirError::from_http_response`](crate::FhirError::from_http_response).
//!
//! # Example
//!
//! ```rust,ignore
//! use fhir_client::clients::{HttpClient, HttpError, HttpMethod, HttpRequest};
//!
//! match client.request(HttpRequest::builder(HttpMethod::Get, "Patient").build()).await {
//!     Ok(response) => println!("Status: {}", response.code),
//!     Err(HttpError::UntrustedUrl { url, .. }) => println!("Refused to follow {url}"),
//!     Err(HttpError::InvalidUrl { url }) => println!("Cannot request {url}"),
//!     Err(HttpError::Network(e)) => println!("Network error: {e}"),
//! }
//! ```

use thiserror::Error;

/// Unified error type for transport failures.
///
/// Failed round trips are never retried; the first failure is returned as-is.
#[derive(Debug, Error)]
pub enum HttpError {
    /// An absolute URL does not belong to the configured server.
    ///
    /// Returned when following a server-provided link (for example a
    /// bundle's `next` link) that points outside the base URL, so that
    /// credentials are never sent to a foreign host.
    #[error("Refusing to request '{url}': it is outside the base URL '{base_url}'")]
    UntrustedUrl {
        /// The rejected URL.
        url: String,
        /// The configured base URL.
        base_url: String,
    },

    /// The request target cannot be turned into a URL.
    #[error("Invalid request URL '{url}'")]
    InvalidUrl {
        /// The offending path or URL.
        url: String,
    },

    /// Network or connection error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
