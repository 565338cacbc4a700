//! HTTP response types for the FHIR client.
//!
//! This module provides the [`HttpResponse`] type for accessing the status,
//! headers, and JSON body of a server response.

use std::collections::HashMap;

/// An HTTP response from a FHIR server.
///
/// The body is parsed as JSON when possible. An empty body (for example the
/// `204 No Content` of a delete) yields `body == None`; the raw text is always
/// kept so that non-JSON error pages can still be reported.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub code: u16,
    /// Response headers, keyed by lowercase name (headers may repeat).
    pub headers: HashMap<String, Vec<String>>,
    /// The parsed JSON body, if the body was non-empty valid JSON.
    pub body: Option<serde_json::Value>,
    /// The raw response text.
    pub text: String,
}

impl HttpResponse {
    /// Creates a new `HttpResponse`, parsing `text` as JSON.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::HashMap;
    /// use fhir_client::clients::HttpResponse;
    ///
    /// let response = HttpResponse::new(200, HashMap::new(), r#"{"resourceType":"Patient"}"#);
    /// assert!(response.is_ok());
    /// assert_eq!(response.body.unwrap()["resourceType"], "Patient");
    ///
    /// let empty = HttpResponse::new(204, HashMap::new(), "");
    /// assert!(empty.body.is_none());
    /// ```
    #[must_use]
    pub fn new(code: u16, headers: HashMap<String, Vec<String>>, text: impl Into<String>) -> Self {
        let text = text.into();
        let body = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };

        Self {
            code,
            headers,
            body,
            text,
        }
    }

    /// Returns `true` if the response status code is in the 2xx range.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code >= 200 && self.code <= 299
    }
}
