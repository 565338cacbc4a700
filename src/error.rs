//! Configuration error types for the FHIR client.
//!
//! This module contains the error type returned when a [`ClientConfig`]
//! or one of its validated newtypes cannot be constructed.
//!
//! # Error Handling
//!
//! All configuration constructors return `Result<T, ConfigError>` to enable
//! fail-fast validation. Error messages are designed to be clear and actionable.
//!
//! # Example
//!
//! ```rust
//! use fhir_client::{BaseUrl, ConfigError};
//!
//! let result = BaseUrl::new("");
//! assert!(matches!(result, Err(ConfigError::EmptyBaseUrl)));
//! ```
//!
//! [`ClientConfig`]: crate::ClientConfig

use thiserror::Error;

/// Errors that can occur while configuring a client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The server base URL cannot be empty.
    #[error("Base URL cannot be empty. Please provide the URL of a FHIR server.")]
    EmptyBaseUrl,

    /// The server base URL is not an absolute http(s) URL.
    #[error("Invalid base URL '{url}'. Expected an absolute http(s) URL (e.g., 'https://fhir.example.com/fhir').")]
    InvalidBaseUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// The authorization header value cannot be empty.
    #[error("Authorization value cannot be empty.")]
    EmptyAuthorization,

    /// The proxy URL was rejected by the transport.
    #[error("Invalid proxy URL '{url}'.")]
    InvalidProxy {
        /// The invalid proxy URL that was provided.
        url: String,
    },

    /// A header name or value cannot be sent over HTTP.
    #[error("Invalid header '{name}'.")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {reason}")]
    HttpClientBuild {
        /// The transport's description of the failure.
        reason: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },
}
