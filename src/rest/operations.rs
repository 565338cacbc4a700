//! Network operations shared by the async and blocking clients.
//!
//! Everything here is written once against [`Executor`] and awaited either
//! directly (async client) or inside `block_on` (blocking client).

use serde_json::{Map, Value};

use crate::clients::{Executor, HttpMethod};
use crate::rest::model::check_resource_type;
use crate::rest::{operation_path, resource_path, FhirError, ResourceModel, ResourceOperation};

/// How a document is written back to the server.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SaveMode<'a> {
    /// PUT when the document has an id, POST otherwise.
    Auto,
    /// Always POST.
    Create,
    /// Always PUT; the document must have an id.
    Update,
    /// PATCH with only the named top-level fields.
    Fields(&'a [&'a str]),
    /// PATCH with an already collected set of top-level changes.
    Changes(&'a Map<String, Value>),
}

/// Returns the non-empty `id` member of a document.
pub(crate) fn document_id(data: &Map<String, Value>) -> Option<&str> {
    data.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())
}

/// Collects `(field, value)` pairs into a JSON object.
pub(crate) fn collect_fields<I, K, V>(fields: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    fields
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Recursively drops `null` members of objects.
pub(crate) fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

/// Issues a request and returns the (possibly empty) JSON body.
pub(crate) async fn execute<C: Executor>(
    client: &C,
    method: HttpMethod,
    path: &str,
    data: Option<Value>,
    params: &[(&str, &str)],
) -> Result<Option<Value>, FhirError> {
    let params = params
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let (body, _) = client.core().send(method, path, data, params).await?;
    Ok(body)
}

/// Issues a request whose response must carry a JSON body.
pub(crate) async fn request_body<C: Executor>(
    client: &C,
    method: HttpMethod,
    path: &str,
    data: Option<Value>,
    params: Vec<(String, String)>,
) -> Result<Value, FhirError> {
    let (body, status) = client.core().send(method, path, data, params).await?;
    body.ok_or_else(|| FhirError::InvalidResponse {
        message: format!("{method} {path} returned status {status} without a body"),
    })
}

/// GET `Type/id`.
pub(crate) async fn read<C: Executor>(
    client: &C,
    resource_type: &str,
    id: &str,
) -> Result<Value, FhirError> {
    let path = resource_path(resource_type, Some(id));
    request_body(
        client,
        ResourceOperation::Read.default_http_method(),
        &path,
        None,
        Vec::new(),
    )
    .await
}

/// PATCH `Type/id` with explicit field values.
pub(crate) async fn patch<C: Executor>(
    client: &C,
    resource_type: &str,
    id: &str,
    fields: Map<String, Value>,
) -> Result<Value, FhirError> {
    let path = resource_path(resource_type, Some(id));
    request_body(
        client,
        ResourceOperation::Patch.default_http_method(),
        &path,
        Some(Value::Object(fields)),
        Vec::new(),
    )
    .await
}

/// DELETE `Type/id`.
pub(crate) async fn delete<C: Executor>(
    client: &C,
    resource_type: &str,
    id: &str,
) -> Result<(), FhirError> {
    let path = resource_path(resource_type, Some(id));
    client
        .core()
        .send(
            ResourceOperation::Delete.default_http_method(),
            &path,
            None,
            Vec::new(),
        )
        .await?;
    Ok(())
}

/// Writes a document and returns the server's representation of it.
///
/// Returns `None` when the server answered with an empty body.
pub(crate) async fn write<C: Executor>(
    client: &C,
    resource_type: &str,
    data: &Map<String, Value>,
    mode: SaveMode<'_>,
) -> Result<Option<Value>, FhirError> {
    let id = document_id(data);

    let (operation, body) = match mode {
        SaveMode::Fields(fields) => {
            if id.is_none() {
                return Err(FhirError::MissingId { operation: "patch" });
            }
            let selected: Map<String, Value> = fields
                .iter()
                .map(|field| {
                    let value = data.get(*field).cloned().unwrap_or(Value::Null);
                    ((*field).to_string(), value)
                })
                .collect();
            (ResourceOperation::Patch, Value::Object(selected))
        }
        SaveMode::Changes(_) if id.is_none() => {
            return Err(FhirError::MissingId { operation: "patch" })
        }
        SaveMode::Changes(changes) => (ResourceOperation::Patch, Value::Object(changes.clone())),
        SaveMode::Update if id.is_none() => {
            return Err(FhirError::MissingId {
                operation: "update",
            })
        }
        SaveMode::Update => (ResourceOperation::Update, whole_document(resource_type, data)),
        SaveMode::Auto if id.is_some() => {
            (ResourceOperation::Update, whole_document(resource_type, data))
        }
        SaveMode::Auto | SaveMode::Create => {
            (ResourceOperation::Create, whole_document(resource_type, data))
        }
    };

    let path = if operation.requires_id() {
        resource_path(resource_type, id)
    } else {
        resource_path(resource_type, None)
    };

    let (response, _) = client
        .core()
        .send(operation.default_http_method(), &path, Some(body), Vec::new())
        .await?;
    Ok(response)
}

/// Writes a typed model and decodes the server's representation of it.
///
/// An empty response body yields the model as it was sent.
pub(crate) async fn write_model<C: Executor, T: ResourceModel>(
    client: &C,
    model: &T,
    mode: SaveMode<'_>,
) -> Result<T, FhirError> {
    let data: Map<String, Value> = serde_json::from_value(serde_json::to_value(model)?)?;
    let response = write(client, T::RESOURCE_TYPE, &data, mode).await?;
    decode_model(response.unwrap_or(Value::Object(data)))
}

/// Decodes a JSON document into a typed model.
pub(crate) fn decode_model<T: ResourceModel>(value: Value) -> Result<T, FhirError> {
    check_resource_type(T::RESOURCE_TYPE, &value)?;
    Ok(serde_json::from_value(value)?)
}

/// POST `Type/$validate` and inspect the returned `OperationOutcome`.
///
/// Returns the outcome when any issue has severity `fatal` or `error`.
pub(crate) async fn validate<C: Executor>(
    client: &C,
    resource_type: &str,
    document: Value,
) -> Result<Option<Value>, FhirError> {
    let path = operation_path(resource_type, "$validate");
    let outcome = request_body(client, HttpMethod::Post, &path, Some(document), Vec::new()).await?;

    let Some(issues) = outcome.get("issue").and_then(Value::as_array) else {
        return Err(FhirError::InvalidResponse {
            message: "$validate response has no issue list".to_string(),
        });
    };
    let failed = issues.iter().any(|issue| {
        matches!(
            issue.get("severity").and_then(Value::as_str),
            Some("fatal" | "error")
        )
    });

    Ok(failed.then_some(outcome))
}

fn whole_document(resource_type: &str, data: &Map<String, Value>) -> Value {
    let mut document = strip_nulls(&Value::Object(data.clone()));
    if let Value::Object(object) = &mut document {
        object
            .entry("resourceType")
            .or_insert_with(|| Value::String(resource_type.to_string()));
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_nulls_is_recursive() {
        let value = json!({
            "resourceType": "Patient",
            "gender": null,
            "name": [{"given": ["Jo"], "family": null}],
            "meta": {"tag": null}
        });
        assert_eq!(
            strip_nulls(&value),
            json!({
                "resourceType": "Patient",
                "name": [{"given": ["Jo"]}],
                "meta": {}
            })
        );
    }

    #[test]
    fn test_document_id_ignores_empty_ids() {
        let data = json!({"id": ""});
        assert_eq!(document_id(data.as_object().unwrap()), None);
        let data = json!({"id": "p1"});
        assert_eq!(document_id(data.as_object().unwrap()), Some("p1"));
    }

    #[test]
    fn test_whole_document_tags_resource_type() {
        let data = json!({"active": true});
        assert_eq!(
            whole_document("Patient", data.as_object().unwrap()),
            json!({"active": true, "resourceType": "Patient"})
        );
    }
}
