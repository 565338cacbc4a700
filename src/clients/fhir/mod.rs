//! The async FHIR client.
//!
//! [`FhirClient`] drives every network operation of [`Resource`](crate::Resource),
//! [`Reference`](crate::Reference) and [`SearchSet`](crate::SearchSet) as a
//! future. Cancelling (dropping) one of those futures aborts that request
//! only; other operations sharing the client are unaffected.

mod client;

pub use client::FhirClient;
