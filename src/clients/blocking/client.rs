//! Blocking FHIR client.

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::Runtime;

use crate::clients::HttpMethod;
use crate::config::{BaseUrl, ClientConfig};
use crate::rest::{FhirError, Reference, Resource, ResourceModel, Typed};
use crate::search::SearchSet;

/// Blocking client for a FHIR REST server.
///
/// Wraps the async [`FhirClient`](crate::FhirClient) together with a
/// current-thread tokio runtime. Every network operation blocks the calling
/// thread until its round trips finish. Must not be used from inside an
/// async runtime.
///
/// # Example
///
/// ```rust,ignore
/// use fhir_client::blocking::FhirClient;
/// use fhir_client::{BaseUrl, ClientConfig};
///
/// let config = ClientConfig::builder()
///     .base_url(BaseUrl::new("http://localhost:8080/fhir")?)
///     .build()?;
/// let client = FhirClient::new(config)?;
///
/// let mut patient = client.resource("Patient");
/// patient.set("active", true)?;
/// patient.save()?;
/// ```
#[derive(Clone, Debug)]
pub struct FhirClient {
    inner: crate::clients::FhirClient,
    runtime: Arc<Runtime>,
}

// Verify FhirClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FhirClient>();
};

impl FhirClient {
    /// Creates a blocking client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Config`] if the HTTP transport cannot be built,
    /// or [`FhirError::Runtime`] if the runtime cannot be started.
    pub fn new(config: ClientConfig) -> Result<Self, FhirError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let inner = crate::clients::FhirClient::new(config)?;
        Ok(Self {
            inner,
            runtime: Arc::new(runtime),
        })
    }

    pub(crate) const fn inner(&self) -> &crate::clients::FhirClient {
        &self.inner
    }

    /// Runs a future to completion on the client's runtime.
    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        self.inner.config()
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn base_url(&self) -> &BaseUrl {
        self.inner.base_url()
    }

    /// Creates a search over resources of `resource_type`.
    #[must_use]
    pub fn resources(&self, resource_type: impl Into<String>) -> SearchSet<Self> {
        SearchSet::new(self.clone(), resource_type)
    }

    /// Creates a search whose entries decode into the model `T`.
    #[must_use]
    pub fn resources_of<T: ResourceModel>(&self) -> SearchSet<Self, Typed<T>> {
        SearchSet::new(self.clone(), T::RESOURCE_TYPE)
    }

    /// Creates an empty, unsaved resource.
    #[must_use]
    pub fn resource(&self, resource_type: impl Into<String>) -> Resource<Self> {
        Resource::new(self.clone(), resource_type)
    }

    /// Creates a resource from a JSON document carrying a `resourceType`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidResponse`] if `value` is not an object
    /// with a string `resourceType`.
    pub fn resource_from(&self, value: Value) -> Result<Resource<Self>, FhirError> {
        Resource::from_value(self.clone(), value)
    }

    /// Creates a reference to `Type/id`.
    #[must_use]
    pub fn reference(&self, resource_type: &str, id: &str) -> Reference<Self> {
        Reference::new(self.clone(), format!("{resource_type}/{id}"))
    }

    /// Creates a reference from a reference string.
    #[must_use]
    pub fn reference_from(&self, reference: impl Into<String>) -> Reference<Self> {
        Reference::new(self.clone(), reference)
    }

    /// Reads `Type/id`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ResourceNotFound`] if the server answers 404 or
    /// 410, or another [`FhirError`] on failure.
    pub fn get(&self, resource_type: &str, id: &str) -> Result<Resource<Self>, FhirError> {
        let value = self.block_on(crate::rest::operations::read(self, resource_type, id))?;
        Resource::from_value(self.clone(), value)
    }

    /// Reads `Type/id` into the model `T`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails or the document does not
    /// decode into `T`.
    pub fn get_model<T: ResourceModel>(&self, id: &str) -> Result<T, FhirError> {
        self.block_on(self.inner.get_model(id))
    }

    /// Saves a typed model. See [`crate::FhirClient::save`].
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub fn save<T: ResourceModel>(
        &self,
        model: &T,
        fields: Option<&[&str]>,
    ) -> Result<T, FhirError> {
        self.block_on(self.inner.save(model, fields))
    }

    /// Creates a typed model (POST).
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub fn create<T: ResourceModel>(&self, model: &T) -> Result<T, FhirError> {
        self.block_on(self.inner.create(model))
    }

    /// Replaces a typed model (PUT).
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if the model has no id, or another
    /// [`FhirError`] on failure.
    pub fn update<T: ResourceModel>(&self, model: &T) -> Result<T, FhirError> {
        self.block_on(self.inner.update(model))
    }

    /// Patches `Type/id` with explicit field values.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub fn patch<I, K, V>(
        &self,
        resource_type: &str,
        id: &str,
        fields: I,
    ) -> Result<Resource<Self>, FhirError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let fields = crate::rest::operations::collect_fields(fields);
        let value = self.block_on(crate::rest::operations::patch(
            self,
            resource_type,
            id,
            fields,
        ))?;
        Resource::from_value(self.clone(), value)
    }

    /// Deletes `Type/id`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub fn delete(&self, resource_type: &str, id: &str) -> Result<(), FhirError> {
        self.block_on(self.inner.delete(resource_type, id))
    }

    /// Calls an arbitrary path and returns the JSON body, if any.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub fn execute(
        &self,
        path: &str,
        method: HttpMethod,
        data: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, FhirError> {
        self.block_on(self.inner.execute(path, method, data, params))
    }
}
