//! The blocking FHIR client.
//!
//! Same operations and the same [`Resource`](crate::Resource),
//! [`Reference`](crate::Reference) and [`SearchSet`](crate::SearchSet) types as
//! the async client, with every network call blocking the current thread.
//! Multi-page retrieval is exposed as a plain [`Iterator`] of pages.

mod client;

pub use client::FhirClient;
