//! Validated newtype wrappers for configuration values.
//!
//! This module provides type-safe wrappers around string values that validate
//! their contents on construction. Invalid values are rejected with clear error messages.

use crate::error::ConfigError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated FHIR server base URL.
///
/// The URL must be an absolute `http` or `https` URL. Trailing slashes are
/// stripped so that resource paths can be appended with a single `/`.
///
/// # Example
///
/// ```rust
/// use fhir_client::BaseUrl;
///
/// let url = BaseUrl::new("https://fhir.example.com/fhir/").unwrap();
/// assert_eq!(url.as_ref(), "https://fhir.example.com/fhir");
/// assert_eq!(url.path(), "/fhir");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaseUrl {
    url: String,
    path_start: usize,
}

impl BaseUrl {
    /// Creates a new validated base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyBaseUrl`] if the URL is empty, or
    /// [`ConfigError::InvalidBaseUrl`] if it is not an absolute http(s) URL.
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let url = url.trim().trim_end_matches('/').to_string();

        if url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }

        let host_start = if let Some(rest) = url.strip_prefix("https://") {
            url.len() - rest.len()
        } else if let Some(rest) = url.strip_prefix("http://") {
            url.len() - rest.len()
        } else {
            return Err(ConfigError::InvalidBaseUrl { url });
        };

        let remainder = &url[host_start..];
        if remainder.contains(['?', '#']) {
            return Err(ConfigError::InvalidBaseUrl { url });
        }

        let path_start = remainder.find('/').map_or(url.len(), |i| host_start + i);
        if path_start == host_start {
            return Err(ConfigError::InvalidBaseUrl { url });
        }

        Ok(Self { url, path_start })
    }

    /// Returns the path portion of the URL, without a trailing slash.
    ///
    /// For `https://fhir.example.com/fhir` this returns `/fhir`; for a URL
    /// without a path it returns an empty string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.url[self.path_start..]
    }

    /// Joins a relative path onto the base URL.
    ///
    /// Leading slashes on `path` are ignored.
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.url.clone()
        } else {
            format!("{}/{path}", self.url)
        }
    }
}

impl AsRef<str> for BaseUrl {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl Serialize for BaseUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.url)
    }
}

impl<'de> Deserialize<'de> for BaseUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(de::Error::custom)
    }
}

/// A validated `Authorization` header value.
///
/// The value is sent verbatim in the `Authorization` header of every request.
/// Helpers are provided for the two common schemes.
///
/// # Security
///
/// The `Debug` implementation masks the value, displaying only
/// `Authorization(*****)` instead of the actual credentials.
///
/// # Example
///
/// ```rust
/// use fhir_client::Authorization;
///
/// let auth = Authorization::bearer("token-123").unwrap();
/// assert_eq!(auth.as_ref(), "Bearer token-123");
/// assert_eq!(format!("{:?}", auth), "Authorization(*****)");
///
/// let basic = Authorization::basic("root", "secret").unwrap();
/// assert_eq!(basic.as_ref(), "Basic cm9vdDpzZWNyZXQ=");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Authorization(String);

impl Authorization {
    /// Creates an authorization value from a complete header value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyAuthorization`] if the value is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ConfigError::EmptyAuthorization);
        }
        Ok(Self(value))
    }

    /// Creates a `Bearer <token>` authorization value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyAuthorization`] if the token is empty.
    pub fn bearer(token: impl AsRef<str>) -> Result<Self, ConfigError> {
        let token = token.as_ref();
        if token.trim().is_empty() {
            return Err(ConfigError::EmptyAuthorization);
        }
        Ok(Self(format!("Bearer {token}")))
    }

    /// Creates a `Basic <base64(user:password)>` authorization value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyAuthorization`] if the user name is empty.
    pub fn basic(user: impl AsRef<str>, password: impl AsRef<str>) -> Result<Self, ConfigError> {
        let user = user.as_ref();
        if user.is_empty() {
            return Err(ConfigError::EmptyAuthorization);
        }
        let encoded = STANDARD.encode(format!("{user}:{}", password.as_ref()));
        Ok(Self(format!("Basic {encoded}")))
    }
}

impl AsRef<str> for Authorization {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Authorization(*****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_strips_trailing_slashes() {
        let url = BaseUrl::new("http://localhost:8080/fhir//").unwrap();
        assert_eq!(url.as_ref(), "http://localhost:8080/fhir");
    }

    #[test]
    fn test_base_url_path() {
        let url = BaseUrl::new("https://fhir.example.com/baseR4").unwrap();
        assert_eq!(url.path(), "/baseR4");

        let url = BaseUrl::new("http://localhost:8080").unwrap();
        assert_eq!(url.path(), "");
    }

    #[test]
    fn test_base_url_rejects_invalid() {
        assert!(matches!(BaseUrl::new(""), Err(ConfigError::EmptyBaseUrl)));
        assert!(matches!(BaseUrl::new("/"), Err(ConfigError::EmptyBaseUrl)));
        assert!(BaseUrl::new("fhir.example.com").is_err());
        assert!(BaseUrl::new("ftp://fhir.example.com").is_err());
        assert!(BaseUrl::new("https://").is_err());
        assert!(BaseUrl::new("https://fhir.example.com/fhir?x=1").is_err());
    }

    #[test]
    fn test_base_url_join() {
        let url = BaseUrl::new("http://localhost/fhir").unwrap();
        assert_eq!(url.join("Patient/1"), "http://localhost/fhir/Patient/1");
        assert_eq!(url.join("/Patient"), "http://localhost/fhir/Patient");
        assert_eq!(url.join(""), "http://localhost/fhir");
    }

    #[test]
    fn test_base_url_deserializes_with_validation() {
        let url: BaseUrl = serde_json::from_str(r#""http://localhost/fhir/""#).unwrap();
        assert_eq!(url.as_ref(), "http://localhost/fhir");

        let result: Result<BaseUrl, _> = serde_json::from_str(r#""not a url""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_authorization_rejects_empty() {
        assert!(matches!(
            Authorization::new("  "),
            Err(ConfigError::EmptyAuthorization)
        ));
        assert!(Authorization::bearer("").is_err());
        assert!(Authorization::basic("", "pw").is_err());
    }

    #[test]
    fn test_authorization_masks_value_in_debug() {
        let auth = Authorization::new("Bearer super-secret").unwrap();
        let debug_output = format!("{auth:?}");
        assert_eq!(debug_output, "Authorization(*****)");
        assert!(!debug_output.contains("super-secret"));
    }

    #[test]
    fn test_authorization_basic_encodes_credentials() {
        let auth = Authorization::basic("root", "secret").unwrap();
        assert_eq!(auth.as_ref(), "Basic cm9vdDpzZWNyZXQ=");
    }
}
