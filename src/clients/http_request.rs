//! HTTP request types for the FHIR client.
//!
//! This module provides the [`HttpRequest`] type and its builder for
//! constructing requests against a FHIR server, plus the query-string
//! rendering shared by the transport and [`SearchSet`](crate::SearchSet).

use std::fmt;

/// HTTP methods used by the FHIR REST API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method for reading and searching.
    Get,
    /// HTTP POST method for creating resources and invoking operations.
    Post,
    /// HTTP PUT method for full updates.
    Put,
    /// HTTP PATCH method for partial updates.
    Patch,
    /// HTTP DELETE method for removing resources.
    Delete,
}

impl HttpMethod {
    pub(crate) const fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Patch => write!(f, "PATCH"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// An HTTP request to be sent to a FHIR server.
///
/// `path` is either relative to the base URL (`Patient/123`) or an absolute
/// URL returned by the server (a bundle `next` link). Query parameters are
/// kept as an ordered list because FHIR allows repeated parameter names and
/// parameter order is significant for readability of the rendered URL.
///
/// # Example
///
/// ```rust
/// use fhir_client::clients::{HttpMethod, HttpRequest};
/// use serde_json::json;
///
/// let request = HttpRequest::builder(HttpMethod::Get, "Patient")
///     .query_param("name", "John")
///     .query_param("name", "Rivera")
///     .build();
/// assert_eq!(request.query.len(), 2);
///
/// let create = HttpRequest::builder(HttpMethod::Post, "Patient")
///     .body(json!({"resourceType": "Patient"}))
///     .build();
/// assert!(create.body.is_some());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    /// The HTTP method for this request.
    pub http_method: HttpMethod,
    /// The path (relative to the base URL) or absolute URL.
    pub path: String,
    /// The JSON request body, if any.
    pub body: Option<serde_json::Value>,
    /// Query parameters in wire order.
    pub query: Vec<(String, String)>,
}

impl HttpRequest {
    /// Creates a new builder for constructing an `HttpRequest`.
    #[must_use]
    pub fn builder(method: HttpMethod, path: impl Into<String>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(method, path)
    }
}

/// Builder for constructing [`HttpRequest`] instances.
#[derive(Debug)]
pub struct HttpRequestBuilder {
    http_method: HttpMethod,
    path: String,
    body: Option<serde_json::Value>,
    query: Vec<(String, String)>,
}

impl HttpRequestBuilder {
    fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            http_method: method,
            path: path.into(),
            body: None,
            query: Vec::new(),
        }
    }

    /// Sets the JSON request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<serde_json::Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the JSON request body when `body` is `Some`.
    #[must_use]
    pub fn maybe_body(mut self, body: Option<serde_json::Value>) -> Self {
        self.body = body;
        self
    }

    /// Appends query parameters, keeping their order.
    #[must_use]
    pub fn query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Appends a single query parameter.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Builds the [`HttpRequest`].
    #[must_use]
    pub fn build(self) -> HttpRequest {
        HttpRequest {
            http_method: self.http_method,
            path: self.path,
            body: self.body,
            query: self.query,
        }
    }
}

/// Percent-encodes one query-string component.
///
/// `:` `,` and `/` are left readable; they are legal in a query and appear
/// in nearly every FHIR search (`name:exact`, `Patient/1`, `a,b`).
fn encode_component(value: &str) -> String {
    urlencoding::encode(value)
        .replace("%3A", ":")
        .replace("%2C", ",")
        .replace("%2F", "/")
}

/// Renders ordered parameters as a query string without the leading `?`.
///
/// # Example
///
/// ```rust
/// use fhir_client::clients::encode_query;
///
/// let params = vec![
///     ("name:contains".to_string(), "Jo hn".to_string()),
///     ("birthdate".to_string(), "ge2000-01-01T00:00:00+02:00".to_string()),
/// ];
/// assert_eq!(
///     encode_query(&params),
///     "name:contains=Jo%20hn&birthdate=ge2000-01-01T00:00:00%2B02:00"
/// );
/// ```
#[must_use]
pub fn encode_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&")
}
