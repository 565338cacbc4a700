//! Async FHIR client.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::clients::{HttpClient, HttpMethod, HttpRequest};
use crate::config::{BaseUrl, ClientConfig};
use crate::rest::operations::{self, SaveMode};
use crate::rest::{FhirError, Reference, Resource, ResourceModel, Typed};
use crate::search::SearchSet;

/// Async client for a FHIR REST server.
///
/// The client owns the base URL, default headers and authorization, and is
/// the factory for [`SearchSet`]s, [`Resource`]s and [`Reference`]s. It is
/// cheap to clone; clones share one connection pool and one immutable
/// configuration, so any number of operations may run on it concurrently.
///
/// # Thread Safety
///
/// `FhirClient` is `Send + Sync`.
///
/// # Example
///
/// ```rust,ignore
/// use fhir_client::{Authorization, BaseUrl, ClientConfig, FhirClient};
///
/// let config = ClientConfig::builder()
///     .base_url(BaseUrl::new("http://localhost:8080/fhir")?)
///     .authorization(Authorization::bearer("token")?)
///     .build()?;
/// let client = FhirClient::new(config)?;
///
/// let patients = client
///     .resources("Patient")
///     .search("name", "John")
///     .limit(10)
///     .fetch()
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct FhirClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    config: ClientConfig,
    http: HttpClient,
}

// Verify FhirClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<FhirClient>();
};

impl FhirClient {
    /// Creates a client from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Config`] if the HTTP transport cannot be built
    /// from the configured request options.
    pub fn new(config: ClientConfig) -> Result<Self, FhirError> {
        let http = HttpClient::new(&config)?;
        tracing::debug!(base_url = %config.base_url(), "created FHIR client");
        Ok(Self {
            inner: Arc::new(ClientInner { config, http }),
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the server base URL.
    #[must_use]
    pub fn base_url(&self) -> &BaseUrl {
        self.inner.config.base_url()
    }

    /// Returns the underlying HTTP client.
    #[must_use]
    pub fn http_client(&self) -> &HttpClient {
        &self.inner.http
    }

    /// Sends one request and maps non-2xx statuses to [`FhirError`].
    ///
    /// Returns the parsed body (`None` when empty) and the status code.
    pub(crate) async fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        params: Vec<(String, String)>,
    ) -> Result<(Option<Value>, u16), FhirError> {
        let request = HttpRequest::builder(method, path)
            .maybe_body(body)
            .query(params)
            .build();
        let response = self.inner.http.request(request).await?;

        if !response.is_ok() {
            return Err(FhirError::from_http_response(&response));
        }
        if response.body.is_none() && !response.text.trim().is_empty() {
            return Err(FhirError::InvalidResponse {
                message: format!("{method} {path} returned a body that is not JSON"),
            });
        }
        Ok((response.body, response.code))
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

    /// Creates a reference from a reference string such as `Patient/1` or
    /// an absolute URL.
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
    pub async fn get(&self, resource_type: &str, id: &str) -> Result<Resource<Self>, FhirError> {
        let value = operations::read(self, resource_type, id).await?;
        Resource::from_value(self.clone(), value)
    }

    /// Reads `Type/id` into the model `T`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails or the document does not
    /// decode into `T`.
    pub async fn get_model<T: ResourceModel>(&self, id: &str) -> Result<T, FhirError> {
        let value = operations::read(self, T::RESOURCE_TYPE, id).await?;
        operations::decode_model(value)
    }

    /// Saves a typed model: PUT when it has an id, POST otherwise, or PATCH
    /// of just `fields` when given.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if `fields` is given for a model
    /// without an id, or another [`FhirError`] on failure.
    pub async fn save<T: ResourceModel>(
        &self,
        model: &T,
        fields: Option<&[&str]>,
    ) -> Result<T, FhirError> {
        let mode = fields.map_or(SaveMode::Auto, SaveMode::Fields);
        operations::write_model(self, model, mode).await
    }

    /// Creates a typed model (POST).
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub async fn create<T: ResourceModel>(&self, model: &T) -> Result<T, FhirError> {
        operations::write_model(self, model, SaveMode::Create).await
    }

    /// Replaces a typed model (PUT).
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if the model has no id, or another
    /// [`FhirError`] on failure.
    pub async fn update<T: ResourceModel>(&self, model: &T) -> Result<T, FhirError> {
        operations::write_model(self, model, SaveMode::Update).await
    }

    /// Patches `Type/id` with explicit field values.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub async fn patch<I, K, V>(
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
        let fields: Map<String, Value> = operations::collect_fields(fields);
        let value = operations::patch(self, resource_type, id, fields).await?;
        Resource::from_value(self.clone(), value)
    }

    /// Deletes `Type/id`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub async fn delete(&self, resource_type: &str, id: &str) -> Result<(), FhirError> {
        operations::delete(self, resource_type, id).await
    }

    /// Calls an arbitrary path (`Patient/1/$everything`, `_history`, ...)
    /// and returns the JSON body, if any.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub async fn execute(
        &self,
        path: &str,
        method: HttpMethod,
        data: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, FhirError> {
        operations::execute(self, method, path, data, params).await
    }
}
