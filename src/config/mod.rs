//! Configuration types for the FHIR client.
//!
//! This module provides the configuration used to construct a
//! [`FhirClient`](crate::FhirClient) or its blocking counterpart.
//!
//! # Overview
//!
//! The main types in this module are:
//!
//! - [`ClientConfig`]: Process-scoped, read-only client settings
//! - [`ClientConfigBuilder`]: A builder for constructing [`ClientConfig`] instances
//! - [`BaseUrl`]: A validated server base URL
//! - [`Authorization`]: A validated `Authorization` header value with masked debug output
//! - [`RequestOptions`]: Transport knobs forwarded to the HTTP client
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use fhir_client::{Authorization, BaseUrl, ClientConfig, RequestOptions};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://fhir.example.com/fhir").unwrap())
//!     .authorization(Authorization::bearer("token").unwrap())
//!     .header("X-Tenant", "north")
//!     .request_options(RequestOptions::new().timeout(Duration::from_secs(30)))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.base_url().as_ref(), "https://fhir.example.com/fhir");
//! ```

mod newtypes;

pub use newtypes::{Authorization, BaseUrl};

use crate::error::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use std::time::Duration;

/// Transport options applied to the underlying HTTP client.
///
/// These are forwarded to [`reqwest::ClientBuilder`] when the client is
/// constructed. They never override library-managed request parts (query
/// parameters, body, `Accept`/`Content-Type`, `Authorization`).
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use fhir_client::RequestOptions;
///
/// let options = RequestOptions::new()
///     .timeout(Duration::from_secs(10))
///     .accept_invalid_certs(true);
/// assert_eq!(options.timeout_duration(), Some(Duration::from_secs(10)));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    accept_invalid_certs: bool,
    proxy: Option<String>,
    cookie_store: bool,
}

impl RequestOptions {
    /// Creates options with transport defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disables TLS certificate verification when `true`.
    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Routes all requests through the given proxy URL.
    #[must_use]
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    /// Enables an in-memory cookie store.
    #[must_use]
    pub const fn cookie_store(mut self, enabled: bool) -> Self {
        self.cookie_store = enabled;
        self
    }

    /// Returns the total request timeout, if set.
    #[must_use]
    pub const fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the connection timeout, if set.
    #[must_use]
    pub const fn connect_timeout_duration(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Returns whether invalid TLS certificates are accepted.
    #[must_use]
    pub const fn accepts_invalid_certs(&self) -> bool {
        self.accept_invalid_certs
    }

    /// Returns the proxy URL, if set.
    #[must_use]
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Returns whether the cookie store is enabled.
    #[must_use]
    pub const fn cookie_store_enabled(&self) -> bool {
        self.cookie_store
    }
}

/// Configuration for a FHIR client.
///
/// Holds the server base URL, the authorization value, extra headers sent
/// with every request, and transport options. A `ClientConfig` is never
/// mutated after construction, so one instance can back many concurrent
/// operations.
///
/// # Thread Safety
///
/// `ClientConfig` is `Clone`, `Send`, and `Sync`.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    base_url: BaseUrl,
    authorization: Option<Authorization>,
    extra_headers: Vec<(String, String)>,
    user_agent_prefix: Option<String>,
    request_options: RequestOptions,
    http_client: Option<reqwest::Client>,
}

impl ClientConfig {
    /// Creates a new builder for constructing a `ClientConfig`.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Returns the server base URL.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Returns the authorization value, if configured.
    #[must_use]
    pub const fn authorization(&self) -> Option<&Authorization> {
        self.authorization.as_ref()
    }

    /// Returns the extra headers sent with every request.
    #[must_use]
    pub fn extra_headers(&self) -> &[(String, String)] {
        &self.extra_headers
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }

    /// Returns the transport options.
    #[must_use]
    pub const fn request_options(&self) -> &RequestOptions {
        &self.request_options
    }

    /// Returns the caller-supplied `reqwest::Client`, if any.
    ///
    /// When set, [`RequestOptions`] are ignored because the client has
    /// already been built.
    #[must_use]
    pub const fn http_client(&self) -> Option<&reqwest::Client> {
        self.http_client.as_ref()
    }
}

// Verify ClientConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ClientConfig>();
};

/// Builder for constructing [`ClientConfig`] instances.
///
/// The only required field is `base_url`.
///
/// # Defaults
///
/// - `authorization`: `None`
/// - `extra_headers`: empty
/// - `user_agent_prefix`: `None`
/// - `request_options`: [`RequestOptions::default`]
/// - `http_client`: `None` (a client is built from the options)
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<BaseUrl>,
    authorization: Option<Authorization>,
    extra_headers: Vec<(String, String)>,
    user_agent_prefix: Option<String>,
    request_options: Option<RequestOptions>,
    http_client: Option<reqwest::Client>,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server base URL (required).
    #[must_use]
    pub fn base_url(mut self, url: BaseUrl) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Sets the `Authorization` header value.
    #[must_use]
    pub fn authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    /// Adds a header sent with every request.
    ///
    /// Library-managed headers (`Accept`, `Content-Type`, `Authorization`)
    /// take precedence over headers added here.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Sets the user agent prefix for HTTP requests.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Sets the transport options.
    #[must_use]
    pub fn request_options(mut self, options: RequestOptions) -> Self {
        self.request_options = Some(options);
        self
    }

    /// Uses a pre-built `reqwest::Client` instead of building one.
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the [`ClientConfig`], validating that required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `base_url` is not set,
    /// or [`ConfigError::InvalidHeader`] if an extra header cannot be sent.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let base_url = self
            .base_url
            .ok_or(ConfigError::MissingRequiredField { field: "base_url" })?;

        for (name, value) in &self.extra_headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err()
                || HeaderValue::from_str(value).is_err()
            {
                return Err(ConfigError::InvalidHeader { name: name.clone() });
            }
        }

        Ok(ClientConfig {
            base_url,
            authorization: self.authorization,
            extra_headers: self.extra_headers,
            user_agent_prefix: self.user_agent_prefix,
            request_options: self.request_options.unwrap_or_default(),
            http_client: self.http_client,
        })
    }
}
