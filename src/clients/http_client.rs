//! HTTP client for FHIR server communication.
//!
//! This module provides the [`HttpClient`] type, the single network boundary
//! of the crate. Both the async and the blocking FHIR clients issue every
//! round trip through it.

use std::collections::HashMap;

use crate::clients::errors::HttpError;
use crate::clients::http_request::{encode_query, HttpRequest};
use crate::clients::http_response::HttpResponse;
use crate::config::{BaseUrl, ClientConfig};
use crate::error::ConfigError;

/// Library version from Cargo.toml.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Media type used for `Accept` and `Content-Type`.
pub const FHIR_JSON: &str = "application/fhir+json";

/// HTTP client for making requests to a FHIR server.
///
/// The client handles:
/// - URL construction from the base URL, including validation of
///   server-provided absolute links
/// - Default headers including User-Agent, Accept, and Authorization
/// - Response parsing into [`HttpResponse`]
///
/// Failed requests are not retried.
///
/// # Thread Safety
///
/// `HttpClient` is `Send + Sync`, making it safe to share across async tasks.
///
/// # Example
///
/// ```rust,ignore
/// use fhir_client::{BaseUrl, ClientConfig};
/// use fhir_client::clients::{HttpClient, HttpMethod, HttpRequest};
///
/// let config = ClientConfig::builder()
///     .base_url(BaseUrl::new("http://localhost:8080/fhir").unwrap())
///     .build()
///     .unwrap();
/// let client = HttpClient::new(&config)?;
///
/// let request = HttpRequest::builder(HttpMethod::Get, "Patient/123").build();
/// let response = client.request(request).await?;
/// ```
#[derive(Debug)]
pub struct HttpClient {
    /// The internal reqwest HTTP client.
    client: reqwest::Client,
    /// Base URL of the server (e.g., `https://fhir.example.com/fhir`).
    base_url: BaseUrl,
    /// Default headers to include in all requests.
    default_headers: HashMap<String, String>,
}

// Verify HttpClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpClient>();
};

impl HttpClient {
    /// Creates a new HTTP client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProxy`] if the configured proxy URL is
    /// rejected, or [`ConfigError::HttpClientBuild`] if the transport cannot
    /// be initialized.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let user_agent_prefix = config
            .user_agent_prefix()
            .map_or(String::new(), |prefix| format!("{prefix} | "));
        let rust_version = env!("CARGO_PKG_RUST_VERSION");
        let user_agent =
            format!("{user_agent_prefix}fhir-client v{SDK_VERSION} | Rust {rust_version}");

        // Extra headers first so library-managed headers replace them
        let mut default_headers = HashMap::new();
        for (name, value) in config.extra_headers() {
            insert_header(&mut default_headers, name, value);
        }
        insert_header(&mut default_headers, "User-Agent", &user_agent);
        insert_header(&mut default_headers, "Accept", FHIR_JSON);
        if let Some(authorization) = config.authorization() {
            insert_header(&mut default_headers, "Authorization", authorization.as_ref());
        }

        let client = match config.http_client() {
            Some(client) => client.clone(),
            None => Self::build_client(config)?,
        };

        Ok(Self {
            client,
            base_url: config.base_url().clone(),
            default_headers,
        })
    }

    fn build_client(config: &ClientConfig) -> Result<reqwest::Client, ConfigError> {
        let options = config.request_options();
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(options.accepts_invalid_certs())
            .cookie_store(options.cookie_store_enabled());

        if let Some(timeout) = options.timeout_duration() {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = options.connect_timeout_duration() {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(proxy_url) = options.proxy_url() {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|_| ConfigError::InvalidProxy {
                url: proxy_url.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(|e| ConfigError::HttpClientBuild {
            reason: e.to_string(),
        })
    }

    /// Returns the base URL for this client.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Returns the default headers for this client.
    #[must_use]
    pub const fn default_headers(&self) -> &HashMap<String, String> {
        &self.default_headers
    }

    /// Resolves a request path into an absolute URL.
    ///
    /// - Absolute URLs must start with the base URL, otherwise
    ///   [`HttpError::UntrustedUrl`] is returned.
    /// - Relative paths have leading slashes removed, and a leading copy of
    ///   the base URL's path is stripped (servers often return next links as
    ///   `/fhir/Patient?page=2`).
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::UntrustedUrl`] or [`HttpError::InvalidUrl`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use fhir_client::{BaseUrl, ClientConfig};
    /// use fhir_client::clients::HttpClient;
    ///
    /// let config = ClientConfig::builder()
    ///     .base_url(BaseUrl::new("http://localhost/fhir").unwrap())
    ///     .build()
    ///     .unwrap();
    /// let client = HttpClient::new(&config).unwrap();
    ///
    /// assert_eq!(client.resolve_url("Patient/1").unwrap(), "http://localhost/fhir/Patient/1");
    /// assert_eq!(
    ///     client.resolve_url("/fhir/Patient?page=2").unwrap(),
    ///     "http://localhost/fhir/Patient?page=2"
    /// );
    /// assert!(client.resolve_url("https://elsewhere/fhir/Patient").is_err());
    /// ```
    pub fn resolve_url(&self, path: &str) -> Result<String, HttpError> {
        let path = path.trim();
        let base = self.base_url.as_ref();

        if path.starts_with("http://") || path.starts_with("https://") {
            let trusted = path.strip_prefix(base).is_some_and(|rest| {
                rest.is_empty() || rest.starts_with('/') || rest.starts_with('?')
            });
            if !trusted {
                return Err(HttpError::UntrustedUrl {
                    url: path.to_string(),
                    base_url: base.to_string(),
                });
            }
            return Ok(path.to_string());
        }

        if path.starts_with("//") || path.contains("://") || path.contains(char::is_whitespace) {
            return Err(HttpError::InvalidUrl {
                url: path.to_string(),
            });
        }

        let relative = path.trim_start_matches('/');
        let base_path = self.base_url.path().trim_start_matches('/');
        let relative = if base_path.is_empty() {
            relative
        } else {
            relative
                .strip_prefix(base_path)
                .filter(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
                .map_or(relative, |rest| rest.trim_start_matches('/'))
        };

        if let Some(query) = relative.strip_prefix('?') {
            return Ok(format!("{base}?{query}"));
        }
        Ok(self.base_url.join(relative))
    }

    /// Sends an HTTP request to the FHIR server.
    ///
    /// Non-2xx responses are returned as `Ok`; callers decide how to map
    /// them (see [`FhirError::from_http_response`](crate::FhirError::from_http_response)).
    ///
    /// # Errors
    ///
    /// Returns [`HttpError`] if the URL cannot be resolved or a network error
    /// occurs.
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut url = self.resolve_url(&request.path)?;
        if !request.query.is_empty() {
            let separator = if url.contains('?') { '&' } else { '?' };
            url = format!("{url}{separator}{}", encode_query(&request.query));
        }

        let mut headers = self.default_headers.clone();
        if request.body.is_some() {
            insert_header(&mut headers, "Content-Type", FHIR_JSON);
        }

        tracing::debug!(method = %request.http_method, url = %url, "sending FHIR request");

        let mut req_builder = self
            .client
            .request(request.http_method.as_reqwest(), url.as_str());
        for (key, value) in &headers {
            req_builder = req_builder.header(key, value);
        }
        if let Some(body) = &request.body {
            req_builder = req_builder.body(body.to_string());
        }

        let res = req_builder.send().await?;

        let code = res.status().as_u16();
        let res_headers = Self::parse_response_headers(res.headers());
        let text = res.text().await?;

        tracing::debug!(status = code, url = %url, "received FHIR response");

        Ok(HttpResponse::new(code, res_headers, text))
    }

    /// Parses response headers into a `HashMap`.
    fn parse_response_headers(
        headers: &reqwest::header::HeaderMap,
    ) -> HashMap<String, Vec<String>> {
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            let key = name.as_str().to_lowercase();
            let value = value.to_str().unwrap_or_default().to_string();
            result.entry(key).or_default().push(value);
        }
        result
    }
}

/// Inserts a header, replacing any existing header with the same name
/// regardless of case.
fn insert_header(headers: &mut HashMap<String, String>, name: &str, value: &str) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Authorization, RequestOptions};

    fn client_for(url: &str) -> HttpClient {
        let config = ClientConfig::builder()
            .base_url(BaseUrl::new(url).unwrap())
            .build()
            .unwrap();
        HttpClient::new(&config).unwrap()
    }

    #[test]
    fn test_user_agent_header_format() {
        let client = client_for("http://localhost/fhir");

        let user_agent = client.default_headers().get("User-Agent").unwrap();
        assert!(user_agent.starts_with("fhir-client v"));
        assert!(user_agent.contains("Rust"));
    }

    #[test]
    fn test_user_agent_with_prefix() {
        let config = ClientConfig::builder()
            .base_url(BaseUrl::new("http://localhost/fhir").unwrap())
            .user_agent_prefix("MyApp/1.0")
            .build()
            .unwrap();
        let client = HttpClient::new(&config).unwrap();

        let user_agent = client.default_headers().get("User-Agent").unwrap();
        assert!(user_agent.starts_with("MyApp/1.0 | fhir-client v"));
    }

    #[test]
    fn test_accept_header_is_fhir_json() {
        let client = client_for("http://localhost/fhir");
        assert_eq!(
            client.default_headers().get("Accept"),
            Some(&"application/fhir+json".to_string())
        );
        assert!(client.default_headers().get("Authorization").is_none());
    }

    #[test]
    fn test_library_headers_win_over_extra_headers() {
        let config = ClientConfig::builder()
            .base_url(BaseUrl::new("http://localhost/fhir").unwrap())
            .authorization(Authorization::bearer("real").unwrap())
            .header("authorization", "Bearer fake")
            .header("accept", "text/html")
            .header("X-Tenant", "north")
            .build()
            .unwrap();
        let client = HttpClient::new(&config).unwrap();
        let headers = client.default_headers();

        assert_eq!(headers.get("Authorization"), Some(&"Bearer real".to_string()));
        assert_eq!(headers.get("Accept"), Some(&FHIR_JSON.to_string()));
        assert!(headers.get("authorization").is_none());
        assert!(headers.get("accept").is_none());
        assert_eq!(headers.get("X-Tenant"), Some(&"north".to_string()));
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let config = ClientConfig::builder()
            .base_url(BaseUrl::new("http://localhost/fhir").unwrap())
            .request_options(RequestOptions::new().proxy("::not a proxy::"))
            .build()
            .unwrap();

        assert!(matches!(
            HttpClient::new(&config),
            Err(ConfigError::InvalidProxy { .. })
        ));
    }

    #[test]
    fn test_resolve_relative_paths() {
        let client = client_for("http://localhost:8080/fhir");

        assert_eq!(
            client.resolve_url("Patient").unwrap(),
            "http://localhost:8080/fhir/Patient"
        );
        assert_eq!(
            client.resolve_url("/Patient/1").unwrap(),
            "http://localhost:8080/fhir/Patient/1"
        );
        assert_eq!(
            client.resolve_url("/fhir/Patient?_page=2").unwrap(),
            "http://localhost:8080/fhir/Patient?_page=2"
        );
        assert_eq!(
            client.resolve_url("fhirPractitioner").unwrap(),
            "http://localhost:8080/fhir/fhirPractitioner"
        );
        assert_eq!(
            client.resolve_url("?_getpages=abc").unwrap(),
            "http://localhost:8080/fhir?_getpages=abc"
        );
        assert_eq!(client.resolve_url("").unwrap(), "http://localhost:8080/fhir");
    }

    #[test]
    fn test_resolve_absolute_urls() {
        let client = client_for("http://localhost:8080/fhir");

        assert_eq!(
            client
                .resolve_url("http://localhost:8080/fhir/Patient?page=2")
                .unwrap(),
            "http://localhost:8080/fhir/Patient?page=2"
        );
        assert!(matches!(
            client.resolve_url("http://evil.example.com/fhir/Patient"),
            Err(HttpError::UntrustedUrl { .. })
        ));
        assert!(matches!(
            client.resolve_url("http://localhost:8080/fhir-other/Patient"),
            Err(HttpError::UntrustedUrl { .. })
        ));
        assert!(matches!(
            client.resolve_url("//evil.example.com/Patient"),
            Err(HttpError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_client_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpClient>();
    }
}
