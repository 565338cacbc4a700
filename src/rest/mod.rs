//! Resources, references and the error taxonomy.
//!
//! This module provides:
//!
//! - **[`Resource`]**: a dynamic FHIR resource with dirty tracking
//! - **[`Reference`]**: a resolvable `Type/id` pointer
//! - **[`ResourceModel`]**: the trait binding a serde model to a
//!   `resourceType`, for typed searches and CRUD
//! - **[`BundlePage`]**: one parsed page of search results
//! - **[`DirtyFields`]**: the set of fields changed since the last save
//! - **Path building**: [`resource_path`] and [`operation_path`]
//! - **[`FhirError`]**: every failure an operation can report
//!
//! # Execution Modes
//!
//! `Resource<C>` and `Reference<C>` are generic over the client that created
//! them. With the async [`FhirClient`](crate::FhirClient) their network
//! methods are `async fn`s; with
//! [`blocking::FhirClient`](crate::blocking::FhirClient) the same methods
//! block. Both share one implementation.

mod errors;
pub(crate) mod model;
pub(crate) mod operations;
mod path;
mod reference;
mod resource;
mod response;
mod tracking;

pub use errors::FhirError;
pub use model::{Dynamic, EntryDecoder, ResourceModel, Typed};
pub use path::{operation_path, resource_path, ResourceOperation};
pub use reference::Reference;
pub use resource::Resource;
pub use response::BundlePage;
pub use tracking::DirtyFields;
