//! # FHIR Client
//!
//! A typed client for FHIR and Aidbox REST servers, with CRUD on resources,
//! a lazy chainable search builder, and path-based access to nested
//! resource documents.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`ClientConfig`] and [`ClientConfigBuilder`]
//! - Validated newtypes for the base URL and authorization value
//! - An async client, [`FhirClient`], and a blocking one,
//!   [`blocking::FhirClient`], sharing the same operations
//! - Dynamic resources with dirty tracking ([`Resource`]) and resolvable
//!   references ([`Reference`])
//! - Typed models through [`ResourceModel`]
//! - A lazy search builder ([`SearchSet`]) with modifiers, chaining,
//!   includes, `_has` filters and pagination
//! - [`get_by_path`](document::get_by_path) / [`set_by_path`](document::set_by_path)
//!   over nested JSON documents
//!
//! ## Quick Start
//!
//! ```rust
//! use fhir_client::{Authorization, BaseUrl, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("http://localhost:8080/fhir").unwrap())
//!     .authorization(Authorization::basic("root", "secret").unwrap())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.base_url().as_ref(), "http://localhost:8080/fhir");
//! ```
//!
//! ## Searching
//!
//! ```rust,ignore
//! use fhir_client::FhirClient;
//!
//! let client = FhirClient::new(config)?;
//!
//! let practitioner = client
//!     .resources("Practitioner")
//!     .search("identifier", "npi|123")
//!     .get()
//!     .await?;
//! let patients = client
//!     .resources("Patient")
//!     .search("general_practitioner", &practitioner)
//!     .search("birthdate__ge", chrono::NaiveDate::from_ymd_opt(1990, 1, 1).unwrap())
//!     .sort(&["-birthdate"])
//!     .fetch_all()
//!     .await?;
//! ```
//!
//! ## Resources
//!
//! ```rust,ignore
//! use fhir_client::path;
//! use serde_json::json;
//!
//! let mut patient = client.resource("Patient");
//! patient.set("name", json!([{"given": ["Jo"], "family": "Rivera"}]))?;
//! patient.save().await?;
//!
//! let family = patient.get_by_path(&path!["name", 0, "family"]);
//! patient.set("active", false)?;
//! patient.save_changes().await?;
//! ```
//!
//! ## Blocking Mode
//!
//! ```rust,ignore
//! use fhir_client::blocking::FhirClient;
//!
//! let client = FhirClient::new(config)?;
//! let count = client.resources("Patient").search("active", true).count()?;
//! ```
//!
//! ## Logging
//!
//! Requests are logged through [`tracing`] at `debug` level and pagination
//! at `trace` level. The crate never installs a subscriber.

pub mod clients;
pub mod config;
pub mod document;
pub mod error;
pub mod rest;
pub mod search;

// Re-export public types at crate root for convenience
pub use config::{Authorization, BaseUrl, ClientConfig, ClientConfigBuilder, RequestOptions};
pub use error::ConfigError;

pub use clients::{blocking, FhirClient, HttpError, HttpMethod};
pub use rest::{FhirError, Reference, Resource, ResourceModel};
pub use search::{Include, SearchSet, SearchValue};
