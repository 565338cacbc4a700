//! Dynamic FHIR resources.
//!
//! A [`Resource`] is a JSON object tagged with an immutable `resourceType`,
//! bound to the client that created it. Top-level mutations are recorded in
//! a [`DirtyFields`] set so that [`save_changes`](Resource::save_changes)
//! can send a PATCH instead of the whole document.
//!
//! # Example
//!
//! ```rust,ignore
//! use fhir_client::path;
//! use serde_json::json;
//!
//! let mut patient = client.resource("Patient");
//! patient.set("name", json!([{"given": ["John"], "family": "Rivera"}]))?;
//! patient.set_by_path(&path!["telecom", 0], json!({"system": "phone", "value": "555"}))?;
//! patient.save().await?;                 // POST Patient
//!
//! patient.set("active", false)?;
//! patient.save_changes().await?;         // PATCH Patient/<id> {"active": false}
//!
//! let reference = patient.to_reference(None::<(&str, &str)>)?;
//! assert_eq!(reference.reference(), patient.reference().as_deref());
//! ```

use std::ops::Index;

use serde_json::{Map, Value};

use crate::clients::{blocking, Executor, FhirClient, HttpMethod};
use crate::document::{get_by_path, set_by_path, PathStep};
use crate::rest::model::check_resource_type;
use crate::rest::operations::{self, document_id, strip_nulls, SaveMode};
use crate::rest::{operation_path, resource_path, DirtyFields, FhirError, Reference, ResourceModel};
use crate::search::SearchValue;

static NULL: Value = Value::Null;

/// A single FHIR resource with dirty tracking.
///
/// Field values are plain [`serde_json::Value`]s. Reading never fails:
/// [`get`](Self::get) returns `None` and indexing returns `null` for
/// missing members. Writes go through [`set`](Self::set) and friends,
/// which refuse to change `resourceType`.
#[derive(Clone, Debug)]
pub struct Resource<C> {
    client: C,
    resource_type: String,
    data: Map<String, Value>,
    dirty: DirtyFields,
}

impl<C: Executor> Resource<C> {
    pub(crate) fn new(client: C, resource_type: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        let mut data = Map::new();
        data.insert(
            "resourceType".to_string(),
            Value::String(resource_type.clone()),
        );
        Self {
            client,
            resource_type,
            data,
            dirty: DirtyFields::new(),
        }
    }

    pub(crate) fn from_value(client: C, value: Value) -> Result<Self, FhirError> {
        let Value::Object(data) = value else {
            return Err(FhirError::InvalidResponse {
                message: "expected a resource object".to_string(),
            });
        };
        let resource_type = data
            .get("resourceType")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FhirError::InvalidResponse {
                message: "resource has no resourceType".to_string(),
            })?
            .to_string();

        Ok(Self {
            client,
            resource_type,
            data,
            dirty: DirtyFields::new(),
        })
    }

    /// Returns the client this resource issues requests through.
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the id, if the resource has been saved.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        document_id(&self.data)
    }

    /// Returns the `Type/id` reference string, if the resource has an id.
    #[must_use]
    pub fn reference(&self) -> Option<String> {
        self.id().map(|id| format!("{}/{id}", self.resource_type))
    }

    /// Returns a top-level member.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Sets a top-level member and marks it dirty.
    ///
    /// Setting `resourceType` to its current value is accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ImmutableResourceType`] if `key` is
    /// `resourceType` and `value` differs from the current type.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), FhirError> {
        let key = key.into();
        let value = value.into();
        if key == "resourceType" {
            if value.as_str() == Some(self.resource_type.as_str()) {
                return Ok(());
            }
            return Err(self.immutable());
        }
        self.dirty.mark(key.clone());
        self.data.insert(key, value);
        Ok(())
    }

    /// Returns a mutable top-level member, marking it dirty.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ImmutableResourceType`] for `resourceType`.
    pub fn get_mut(&mut self, key: &str) -> Result<Option<&mut Value>, FhirError> {
        self.guard(key)?;
        if self.data.contains_key(key) {
            self.dirty.mark(key);
        }
        Ok(self.data.get_mut(key))
    }

    /// Returns the member `key`, inserting `default` first if it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ImmutableResourceType`] for `resourceType`.
    pub fn setdefault(
        &mut self,
        key: impl Into<String>,
        default: impl Into<Value>,
    ) -> Result<&mut Value, FhirError> {
        let key = key.into();
        self.guard(&key)?;
        self.dirty.mark(key.clone());
        Ok(self.data.entry(key).or_insert_with(|| default.into()))
    }

    /// Removes a top-level member.
    ///
    /// The removal is tracked, so a following `save_changes` clears the
    /// field on the server.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ImmutableResourceType`] for `resourceType`.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, FhirError> {
        self.guard(key)?;
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.dirty.mark(key);
        }
        Ok(removed)
    }

    /// Returns the value at `path`, or `None` if it cannot be resolved.
    ///
    /// The first step must be a member name.
    #[must_use]
    pub fn get_by_path(&self, path: &[PathStep]) -> Option<&Value> {
        match path.split_first()? {
            (PathStep::Key(key), rest) => get_by_path(self.data.get(key)?, rest),
            _ => None,
        }
    }

    /// Returns the value at `path`, or `default`.
    #[must_use]
    pub fn get_by_path_or<'a>(&'a self, path: &[PathStep], default: &'a Value) -> &'a Value {
        self.get_by_path(path).unwrap_or(default)
    }

    /// Assigns `value` at `path`, creating missing intermediate containers,
    /// and marks the top-level member dirty.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Path`] if the path cannot be resolved (see
    /// [`set_by_path`](crate::document::set_by_path)), or
    /// [`FhirError::ImmutableResourceType`] if it starts at `resourceType`.
    pub fn set_by_path(
        &mut self,
        path: &[PathStep],
        value: impl Into<Value>,
    ) -> Result<(), FhirError> {
        let top = match path.first() {
            Some(PathStep::Key(key)) => Some(key.clone()),
            _ => None,
        };
        if let Some(key) = &top {
            self.guard(key)?;
        }

        let mut document = Value::Object(std::mem::take(&mut self.data));
        let result = set_by_path(&mut document, path, value.into());
        if let Value::Object(data) = document {
            self.data = data;
        }
        result?;

        if let Some(key) = top {
            self.dirty.mark(key);
        }
        Ok(())
    }

    /// Returns a [`Reference`] to the object at `path`, if it has a
    /// `reference` member.
    #[must_use]
    pub fn reference_at(&self, path: &[PathStep]) -> Option<Reference<C>> {
        let object = self.get_by_path(path)?.as_object()?;
        object.get("reference")?.as_str()?;
        Some(Reference::from_map(self.client.clone(), object.clone()))
    }

    /// Returns the fields changed since the last load or save.
    #[must_use]
    pub const fn dirty_fields(&self) -> &DirtyFields {
        &self.dirty
    }

    /// Returns `true` if any field changed since the last load or save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Returns the underlying JSON object, `null` members included.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Returns the wire representation: the document with every `null`
    /// member dropped.
    #[must_use]
    pub fn serialize(&self) -> Value {
        strip_nulls(&Value::Object(self.data.clone()))
    }

    /// Decodes the resource into the model `T`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ResourceTypeMismatch`] if `T` models another
    /// type, or [`FhirError::Serialization`] if the document does not fit.
    pub fn to_model<T: ResourceModel>(&self) -> Result<T, FhirError> {
        operations::decode_model(self.serialize())
    }

    /// Builds a [`Reference`] to this resource, merging `extra` members
    /// (such as `display`).
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if the resource has no id.
    pub fn to_reference<I, K, V>(&self, extra: I) -> Result<Reference<C>, FhirError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let reference = self.reference().ok_or(FhirError::MissingId {
            operation: "to_reference",
        })?;
        let mut data = operations::collect_fields(extra);
        data.insert("reference".to_string(), Value::String(reference));
        Ok(Reference::from_map(self.client.clone(), data))
    }

    fn guard(&self, key: &str) -> Result<(), FhirError> {
        if key == "resourceType" {
            Err(self.immutable())
        } else {
            Ok(())
        }
    }

    fn immutable(&self) -> FhirError {
        FhirError::ImmutableResourceType {
            resource_type: self.resource_type.clone(),
        }
    }

    fn require_id(&self, operation: &'static str) -> Result<&str, FhirError> {
        self.id().ok_or(FhirError::MissingId { operation })
    }

    /// Replaces the local document with a server response.
    fn replace(&mut self, value: Value) -> Result<(), FhirError> {
        check_resource_type(&self.resource_type, &value)?;
        let Value::Object(mut data) = value else {
            return Err(FhirError::InvalidResponse {
                message: "expected a resource object".to_string(),
            });
        };
        data.entry("resourceType")
            .or_insert_with(|| Value::String(self.resource_type.clone()));
        self.data = data;
        self.dirty.clear();
        Ok(())
    }

    async fn save_impl(&mut self, mode: SaveMode<'_>) -> Result<(), FhirError> {
        let response =
            operations::write(&self.client, &self.resource_type, &self.data, mode).await?;
        match response {
            Some(value) => self.replace(value),
            None => {
                self.dirty.clear();
                Ok(())
            }
        }
    }

    async fn save_changes_impl(&mut self) -> Result<(), FhirError> {
        if self.id().is_none() {
            return self.save_impl(SaveMode::Create).await;
        }
        if self.dirty.is_empty() {
            return Ok(());
        }
        let changes = self.dirty.extract(&self.data);
        self.save_impl(SaveMode::Changes(&changes)).await
    }

    async fn patch_impl(&mut self, fields: Map<String, Value>) -> Result<(), FhirError> {
        let keys: Vec<String> = fields.keys().cloned().collect();
        for (key, value) in fields {
            self.set(key, value)?;
        }
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.save_impl(SaveMode::Fields(&keys)).await
    }

    async fn delete_impl(&self) -> Result<(), FhirError> {
        let id = self.require_id("delete")?;
        operations::delete(&self.client, &self.resource_type, id).await
    }

    async fn refresh_impl(&mut self) -> Result<(), FhirError> {
        let id = self.require_id("refresh")?.to_string();
        let value = operations::read(&self.client, &self.resource_type, &id).await?;
        self.replace(value)
    }

    async fn validate_impl(&self) -> Result<Option<Value>, FhirError> {
        operations::validate(&self.client, &self.resource_type, self.serialize()).await
    }

    async fn execute_impl(
        &self,
        operation: &str,
        method: HttpMethod,
        data: Option<Value>,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, FhirError> {
        let path = operation_path(&resource_path(&self.resource_type, self.id()), operation);
        operations::execute(&self.client, method, &path, data, params).await
    }
}

impl Resource<FhirClient> {
    /// Saves the resource: PUT when it has an id, POST otherwise.
    ///
    /// The local document is replaced with the server's response and the
    /// dirty set is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub async fn save(&mut self) -> Result<(), FhirError> {
        self.save_impl(SaveMode::Auto).await
    }

    /// Saves only `fields` with a PATCH. Fields that are missing or `null`
    /// locally are sent as `null`, clearing them on the server.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if the resource has no id, or
    /// another [`FhirError`] if the request fails.
    pub async fn save_fields(&mut self, fields: &[&str]) -> Result<(), FhirError> {
        self.save_impl(SaveMode::Fields(fields)).await
    }

    /// Creates the resource with a POST, even when it already has an id.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub async fn create(&mut self) -> Result<(), FhirError> {
        self.save_impl(SaveMode::Create).await
    }

    /// Replaces the resource with a PUT.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if the resource has no id, or
    /// another [`FhirError`] if the request fails.
    pub async fn update(&mut self) -> Result<(), FhirError> {
        self.save_impl(SaveMode::Update).await
    }

    /// Sends the tracked changes: a PATCH of the dirty fields, nothing when
    /// clean, or a POST for an unsaved resource.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub async fn save_changes(&mut self) -> Result<(), FhirError> {
        self.save_changes_impl().await
    }

    /// Merges `fields` locally and PATCHes them.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::ImmutableResourceType`] if `fields` changes the
    /// type, [`FhirError::MissingId`] if the resource has no id, or another
    /// [`FhirError`] if the request fails.
    pub async fn patch<I, K, V>(&mut self, fields: I) -> Result<(), FhirError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.patch_impl(operations::collect_fields(fields)).await
    }

    /// Deletes the resource.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if the resource has no id, or
    /// another [`FhirError`] if the request fails.
    pub async fn delete(&self) -> Result<(), FhirError> {
        self.delete_impl().await
    }

    /// Re-reads the resource, replacing all local state.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if the resource has no id, or
    /// another [`FhirError`] if the request fails.
    pub async fn refresh(&mut self) -> Result<(), FhirError> {
        self.refresh_impl().await
    }

    /// Validates the resource with `$validate`.
    ///
    /// Returns `false` if any issue has severity `fatal` or `error`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub async fn is_valid(&self) -> Result<bool, FhirError> {
        Ok(self.validate_impl().await?.is_none())
    }

    /// Validates the resource with `$validate`, failing with the returned
    /// `OperationOutcome` when it is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::OperationOutcome`] for an invalid resource, or
    /// another [`FhirError`] if the request fails.
    pub async fn validate(&self) -> Result<(), FhirError> {
        match self.validate_impl().await? {
            Some(outcome) => Err(FhirError::from_outcome(outcome)),
            None => Ok(()),
        }
    }

    /// Calls `operation` on this resource (`Type/id/operation`).
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
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

impl Resource<blocking::FhirClient> {
    /// Saves the resource: PUT when it has an id, POST otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub fn save(&mut self) -> Result<(), FhirError> {
        let client = self.client.clone();
        client.block_on(self.save_impl(SaveMode::Auto))
    }

    /// Saves only `fields` with a PATCH.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if the resource has no id, or
    /// another [`FhirError`] if the request fails.
    pub fn save_fields(&mut self, fields: &[&str]) -> Result<(), FhirError> {
        let client = self.client.clone();
        client.block_on(self.save_impl(SaveMode::Fields(fields)))
    }

    /// Creates the resource with a POST.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub fn create(&mut self) -> Result<(), FhirError> {
        let client = self.client.clone();
        client.block_on(self.save_impl(SaveMode::Create))
    }

    /// Replaces the resource with a PUT.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if the resource has no id, or
    /// another [`FhirError`] if the request fails.
    pub fn update(&mut self) -> Result<(), FhirError> {
        let client = self.client.clone();
        client.block_on(self.save_impl(SaveMode::Update))
    }

    /// Sends the tracked changes.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub fn save_changes(&mut self) -> Result<(), FhirError> {
        let client = self.client.clone();
        client.block_on(self.save_changes_impl())
    }

    /// Merges `fields` locally and PATCHes them.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if a field cannot be set or the request fails.
    pub fn patch<I, K, V>(&mut self, fields: I) -> Result<(), FhirError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let client = self.client.clone();
        client.block_on(self.patch_impl(operations::collect_fields(fields)))
    }

    /// Deletes the resource.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::MissingId`] if the resource has no id, or
    /// another [`FhirError`] if the request fails.
    pub fn delete(&self) -> Result<(), FhirError> {
        self.client.block_on(self.delete_impl())
    }

    /// Re-reads the resource, replacing all local state.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub fn refresh(&mut self) -> Result<(), FhirError> {
        let client = self.client.clone();
        client.block_on(self.refresh_impl())
    }

    /// Validates the resource with `$validate`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
    pub fn is_valid(&self) -> Result<bool, FhirError> {
        Ok(self.client.block_on(self.validate_impl())?.is_none())
    }

    /// Validates the resource, failing with the returned `OperationOutcome`.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::OperationOutcome`] for an invalid resource, or
    /// another [`FhirError`] if the request fails.
    pub fn validate(&self) -> Result<(), FhirError> {
        match self.client.block_on(self.validate_impl())? {
            Some(outcome) => Err(FhirError::from_outcome(outcome)),
            None => Ok(()),
        }
    }

    /// Calls `operation` on this resource.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the request fails.
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

impl<C: Executor> Index<&str> for Resource<C> {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.data.get(key).unwrap_or(&NULL)
    }
}

impl<C: Executor> PartialEq for Resource<C> {
    fn eq(&self, other: &Self) -> bool {
        self.resource_type == other.resource_type && self.data == other.data
    }
}

impl<C: Executor> PartialEq<Reference<C>> for Resource<C> {
    fn eq(&self, other: &Reference<C>) -> bool {
        match (self.reference(), other.reference()) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}

impl<C: Executor> From<&Resource<C>> for SearchValue {
    fn from(resource: &Resource<C>) -> Self {
        Self::Reference(resource.reference().unwrap_or_default())
    }
}
