//! HTTP execution and the FHIR clients.
//!
//! This module provides the network layer of the crate.
//!
//! # Overview
//!
//! - [`HttpClient`]: the transport, owning base URL resolution and default
//!   headers
//! - [`HttpRequest`] / [`HttpRequestBuilder`]: a request to be sent
//! - [`HttpResponse`]: a parsed response
//! - [`HttpMethod`]: GET, POST, PUT, PATCH and DELETE
//! - [`HttpError`]: transport failures
//! - [`FhirClient`]: the async FHIR client
//! - [`blocking::FhirClient`]: the blocking FHIR client
//! - [`Executor`]: the trait both clients implement
//!
//! # Example
//!
//! ```rust,ignore
//! use fhir_client::clients::{HttpClient, HttpMethod, HttpRequest};
//!
//! let http = HttpClient::new(&config)?;
//! let request = HttpRequest::builder(HttpMethod::Get, "Patient")
//!     .query_param("name", "John")
//!     .build();
//! let response = http.request(request).await?;
//! ```
//!
//! # Retry Behavior
//!
//! None. A failed round trip is reported to the caller as is.

pub mod blocking;
mod errors;
mod executor;
mod fhir;
mod http_client;
mod http_request;
mod http_response;

pub use errors::HttpError;
pub use executor::Executor;
pub use fhir::FhirClient;
pub use http_client::{HttpClient, FHIR_JSON, SDK_VERSION};
pub use http_request::{encode_query, HttpMethod, HttpRequest, HttpRequestBuilder};
pub use http_response::HttpResponse;
