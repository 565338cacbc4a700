//! References to resources.
//!
//! A [`Reference`] is the FHIR `Reference` datatype bound to a client: a
//! `reference` string (`Patient/123`, or an absolute URL) plus optional
//! members such as `display`. Local references, those of the exact form
//! `Type/id`, can be resolved, patched and deleted.

use serde_json::{Map, Value};

use crate::clients::{blocking, Executor, FhirClient, HttpMethod};
use crate::rest::operations;
use crate::rest::{operation_path, resource_path, FhirError, Resource};
use crate::search::SearchValue;

/// A pointer to a resource.
#[derive(Clone, Debug)]
pub struct Reference<C> {
    client: C,
    data: Map<String, Value>,
}

impl<C: Executor> Reference<C> {
    pub(crate) fn new(client: C, reference: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("reference".to_string(), Value::String(reference.into()));
        Self { client, data }
    }

    pub(crate) const fn from_map(client: C, data: Map<String, Value>) -> Self {
        Self { client, data }
    }

    /// Returns the reference string.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.data.get("reference").and_then(Value::as_str)
    }

    /// Returns `true` for `Type/id` references.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.reference()
            .is_some_and(|reference| reference.matches('/').count() == 1)
    }

    fn parts(&self) -> Option<(&str, &str)> {
        if !self.is_local() {
            return None;
        }
        self.reference()?.split_once('/')
    }

    /// Returns the referenced type of a local reference.
    #[must_use]
    pub fn resource_type(&self) -> Option<&str> {
        self.parts().map(|(resource_type, _)| resource_type)
    }

    /// Returns the referenced id of a local reference.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.parts().map(|(_, id)| id)
    }

    /// Returns a member such as `display`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Sets a member such as `display`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Returns the underlying JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Returns the wire representation with `null` members dropped.
    #[must_use]
    pub fn serialize(&self) -> Value {
        operations::strip_nulls(&Value::Object(self.data.clone()))
    }

    /// Returns a copy with `extra` members merged in.
    #[must_use]
    pub fn to_reference<I, K, V>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut copy = self.clone();
        copy.data.extend(operations::collect_fields(extra));
        copy
    }

    fn require_local(&self, action: &str) -> Result<(&str, &str), FhirError> {
        self.parts().ok_or_else(|| FhirError::ResourceNotFound {
            message: format!(
                "cannot {action} non-local reference '{}'",
                self.reference().unwrap_or_default()
            ),
        })
    }

    async fn to_resource_impl(&self) -> Result<Resource<C>, FhirError> {
        let (resource_type, id) = self.require_local("resolve")?;
        let value = operations::read(&self.client, resource_type, id).await?;
        Resource::from_value(self.client.clone(), value)
    }

    async fn patch_impl(&self, fields: Map<String, Value>) -> Result<Resource<C>, FhirError> {
        let (resource_type, id) = self.require_local("patch")?;
        let value = operations::patch(&self.client, resource_type, id, fields).await?;
        Resource::from_value(self.client.clone(), value)
    }

    async fn delete_impl(&self) -> Result<(), FhirError> {
        let (resource_type, id) = self.require_local("delete")?;
        operations::delete(&self.client, resource_type, id).await
    }

    async fn execute_impl(
        &self,
        operation: &str,
        method: HttpMethod,
        data: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, FhirError> {
        let (resource_type, id) = self.require_local("execute on")?;
        let path = operation_path(&resource_path(resource_type, Some(id)), operation);
        operations::execute(&self.client, method, &path, data, params).await
    }
}

impl Reference<FhirClient> {
    /// Reads the referenced resource by its exact path.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ResourceNotFound`] for a non-local reference or
    /// a missing resource, or another [`FhirError`] on failure.
    pub async fn to_resource(&self) -> Result<Resource<FhirClient>, FhirError> {
        self.to_resource_impl().await
    }

    /// Patches the referenced resource and returns the result.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ResourceNotFound`] for a non-local reference,
    /// or another [`FhirError`] on failure.
    pub async fn patch<I, K, V>(&self, fields: I) -> Result<Resource<FhirClient>, FhirError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.patch_impl(operations::collect_fields(fields)).await
    }

    /// Deletes the referenced resource.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ResourceNotFound`] for a non-local reference,
    /// or another [`FhirError`] on failure.
    pub async fn delete(&self) -> Result<(), FhirError> {
        self.delete_impl().await
    }

    /// Calls `operation` on the referenced resource.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ResourceNotFound`] for a non-local reference,
    /// or another [`FhirError`] on failure.
    pub async fn execute(
        &self,
        operation: &str,
        method: HttpMethod,
        data: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, FhirError> {
        self.execute_impl(operation, method, data, params).await
    }
}

impl Reference<blocking::FhirClient> {
    /// Reads the referenced resource by its exact path.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ResourceNotFound`] for a non-local reference or
    /// a missing resource, or another [`FhirError`] on failure.
    pub fn to_resource(&self) -> Result<Resource<blocking::FhirClient>, FhirError> {
        self.client.block_on(self.to_resource_impl())
    }

    /// Patches the referenced resource and returns the result.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub fn patch<I, K, V>(&self, fields: I) -> Result<Resource<blocking::FhirClient>, FhirError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.client
            .block_on(self.patch_impl(operations::collect_fields(fields)))
    }

    /// Deletes the referenced resource.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub fn delete(&self) -> Result<(), FhirError> {
        self.client.block_on(self.delete_impl())
    }

    /// Calls `operation` on the referenced resource.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on failure.
    pub fn execute(
        &self,
        operation: &str,
        method: HttpMethod,
        data: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, FhirError> {
        self.client
            .block_on(self.execute_impl(operation, method, data, params))
    }
}

impl<C: Executor> PartialEq for Reference<C> {
    fn eq(&self, other: &Self) -> bool {
        match (self.reference(), other.reference()) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => self.data == other.data,
        }
    }
}

impl<C: Executor> PartialEq<Resource<C>> for Reference<C> {
    fn eq(&self, other: &Resource<C>) -> bool {
        other == self
    }
}

impl<C: Executor> From<&Reference<C>> for SearchValue {
    fn from(reference: &Reference<C>) -> Self {
        Self::Reference(reference.reference().unwrap_or_default().to_string())
    }
}
