//! `_include` / `_revinclude` directives.

use crate::search::params::EncodingError;

/// An include directive for [`SearchSet::include`](crate::SearchSet::include)
/// and [`SearchSet::revinclude`](crate::SearchSet::revinclude).
///
/// Renders as `_include[:iterate][:recurse]=Type:attr[:Target]`, or `*` for
/// the wildcard form.
///
/// # Example
///
/// ```rust
/// use fhir_client::search::Include;
///
/// let include = Include::new("Encounter", "subject").target("Patient").iterate();
/// assert_eq!(
///     include.to_param(false).unwrap(),
///     ("_include:iterate".to_string(), "Encounter:subject:Patient".to_string())
/// );
///
/// let everything = Include::wildcard();
/// assert_eq!(everything.to_param(true).unwrap().1, "*");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Include {
    resource_type: String,
    attr: Option<String>,
    target: Option<String>,
    iterate: bool,
    recursive: bool,
}

impl Include {
    /// Includes resources referenced by `resource_type.attr`.
    ///
    /// `attr` may be `*` to follow every reference of the type.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attr: Some(attr.into()),
            target: None,
            iterate: false,
            recursive: false,
        }
    }

    /// Includes everything (`_include=*`).
    #[must_use]
    pub const fn wildcard() -> Self {
        Self {
            resource_type: String::new(),
            attr: None,
            target: None,
            iterate: false,
            recursive: false,
        }
    }

    /// Restricts the include to references of the given target type.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Adds the `:iterate` modifier.
    #[must_use]
    pub const fn iterate(mut self) -> Self {
        self.iterate = true;
        self
    }

    /// Adds the `:recurse` modifier used by older servers.
    #[must_use]
    pub const fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    fn is_wildcard(&self) -> bool {
        self.resource_type.is_empty() || self.resource_type == "*"
    }

    /// Renders the directive as a query pair.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError`] if a non-wildcard include has an empty
    /// search parameter.
    pub fn to_param(&self, reverse: bool) -> Result<(String, String), EncodingError> {
        let mut key = String::from(if reverse { "_revinclude" } else { "_include" });
        if self.iterate {
            key.push_str(":iterate");
        }
        if self.recursive {
            key.push_str(":recurse");
        }

        if self.is_wildcard() {
            return Ok((key, "*".to_string()));
        }

        let attr = self
            .attr
            .as_deref()
            .filter(|attr| !attr.is_empty())
            .ok_or_else(|| {
                EncodingError::new(
                    key.clone(),
                    format!("include of '{}' needs a search parameter", self.resource_type),
                )
            })?;

        let mut value = format!("{}:{attr}", self.resource_type);
        if let Some(target) = &self.target {
            value.push(':');
            value.push_str(target);
        }
        Ok((key, value))
    }
}
