//! Typed resource models.
//!
//! A [`SearchSet`](crate::SearchSet) yields dynamic [`Resource`]s by default.
//! Searches created through `resources_of::<T>()` decode entries into a serde
//! model instead. The model only has to name its `resourceType`:
//!
//! ```rust
//! use fhir_client::ResourceModel;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Patient {
//!     id: Option<String>,
//!     #[serde(default)]
//!     active: bool,
//! }
//!
//! impl ResourceModel for Patient {
//!     const RESOURCE_TYPE: &'static str = "Patient";
//! }
//! ```
//!
//! The `resourceType` member is checked on decode and added on encode, so
//! models need not carry it themselves.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::clients::Executor;
use crate::rest::operations::decode_model;
use crate::rest::{FhirError, Resource};

/// A serde model bound to one resource type.
pub trait ResourceModel: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The `resourceType` discriminator of this model.
    const RESOURCE_TYPE: &'static str;
}

/// Converts between wire JSON and the values a search returns.
///
/// Implemented by [`Dynamic`] and [`Typed`]; not meant to be implemented
/// outside this crate.
pub trait EntryDecoder<C>: Send + Sync + 'static {
    /// The decoded entry type.
    type Output: Send;

    /// Decodes one entry.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if the entry does not have the expected shape.
    fn decode(client: &C, value: Value) -> Result<Self::Output, FhirError>;

    /// Encodes an entry for a request body.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Serialization`] if the value cannot be encoded.
    fn encode(output: &Self::Output) -> Result<Value, FhirError>;
}

/// Decodes entries into dynamic [`Resource`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dynamic;

impl<C: Executor> EntryDecoder<C> for Dynamic {
    type Output = Resource<C>;

    fn decode(client: &C, value: Value) -> Result<Self::Output, FhirError> {
        Resource::from_value(client.clone(), value)
    }

    fn encode(output: &Self::Output) -> Result<Value, FhirError> {
        Ok(output.serialize())
    }
}

/// Decodes entries into the model `T`.
pub struct Typed<T>(PhantomData<fn() -> T>);

impl<C, T: ResourceModel> EntryDecoder<C> for Typed<T> {
    type Output = T;

    fn decode(_client: &C, value: Value) -> Result<T, FhirError> {
        decode_model(value)
    }

    fn encode(output: &T) -> Result<Value, FhirError> {
        let mut value = serde_json::to_value(output)?;
        if let Value::Object(object) = &mut value {
            object.insert(
                "resourceType".to_string(),
                Value::String(T::RESOURCE_TYPE.to_string()),
            );
        }
        Ok(value)
    }
}

/// Fails when `value` declares a `resourceType` other than `expected`.
pub(crate) fn check_resource_type(expected: &str, value: &Value) -> Result<(), FhirError> {
    match value.get("resourceType").and_then(Value::as_str) {
        None => Ok(()),
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(FhirError::ResourceTypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }),
    }
}
