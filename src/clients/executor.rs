//! The execution seam between resources and clients.

use std::fmt;

use crate::clients::FhirClient;

mod sealed {
    pub trait Sealed {}

    impl Sealed for crate::clients::FhirClient {}
    impl Sealed for crate::clients::blocking::FhirClient {}
}

/// A client that [`Resource`](crate::Resource), [`Reference`](crate::Reference)
/// and [`SearchSet`](crate::SearchSet) can issue requests through.
///
/// Implemented by the async [`FhirClient`] and by
/// [`blocking::FhirClient`](crate::clients::blocking::FhirClient). The trait
/// is sealed: request logic is written once against it, and each client only
/// decides how the resulting futures are driven.
pub trait Executor: Clone + fmt::Debug + Send + Sync + 'static + sealed::Sealed {
    /// Returns the async client that performs the round trips.
    #[doc(hidden)]
    fn core(&self) -> &FhirClient;
}

impl Executor for FhirClient {
    fn core(&self) -> &FhirClient {
        self
    }
}

impl Executor for crate::clients::blocking::FhirClient {
    fn core(&self) -> &FhirClient {
        self.inner()
    }
}
