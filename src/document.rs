//! Path-based access to nested JSON documents.
//!
//! FHIR resources are deeply nested: a patient's MRN lives at
//! `identifier[system=...].value`, a given name at `name.0.given.0`. This
//! module provides [`get_by_path`] and [`set_by_path`] over
//! [`serde_json::Value`] trees, driven by a list of [`PathStep`]s.
//!
//! # Path Steps
//!
//! - [`PathStep::Key`]: a member of a JSON object
//! - [`PathStep::Index`]: an element of a JSON array
//! - [`PathStep::Filter`]: the first element of an array of objects whose
//!   members equal every member of the filter
//!
//! # Example
//!
//! ```rust
//! use fhir_client::document::{get_by_path, set_by_path, PathStep};
//! use fhir_client::path;
//! use serde_json::json;
//!
//! let mut patient = json!({
//!     "identifier": [
//!         {"system": "http://hl7.org/fhir/sid/us-ssn", "value": "123-45-6789"},
//!         {"system": "http://hospital.example.org/mrn", "value": "MRN-1"}
//!     ]
//! });
//!
//! let mrn = path!["identifier", json!({"system": "http://hospital.example.org/mrn"}), "value"];
//! assert_eq!(get_by_path(&patient, &mrn), Some(&json!("MRN-1")));
//!
//! set_by_path(&mut patient, &path!["name", 0, "family"], json!("Rivera")).unwrap();
//! assert_eq!(patient["name"][0]["family"], "Rivera");
//! ```

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// One step of a document path.
#[derive(Clone, Debug, PartialEq)]
pub enum PathStep {
    /// A member name of a JSON object.
    Key(String),
    /// A position in a JSON array.
    Index(usize),
    /// Selects the first array element whose members match all of these.
    Filter(Map<String, Value>),
}

impl PathStep {
    fn matches(filter: &Map<String, Value>, item: &Value) -> bool {
        item.as_object().is_some_and(|object| {
            filter
                .iter()
                .all(|(key, expected)| object.get(key) == Some(expected))
        })
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
            Self::Filter(filter) => write!(f, "{}", Value::Object(filter.clone())),
        }
    }
}

impl From<&str> for PathStep {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathStep {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathStep {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Map<String, Value>> for PathStep {
    fn from(filter: Map<String, Value>) -> Self {
        Self::Filter(filter)
    }
}

/// Converts a JSON value into a step.
///
/// Objects become filters, strings become keys and non-negative integers
/// become indexes. Any other value becomes a key holding its JSON text.
impl From<Value> for PathStep {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(filter) => Self::Filter(filter),
            Value::String(key) => Self::Key(key),
            Value::Number(n) => match n.as_u64().and_then(|n| usize::try_from(n).ok()) {
                Some(index) => Self::Index(index),
                None => Self::Key(n.to_string()),
            },
            other => Self::Key(other.to_string()),
        }
    }
}

/// Builds a `Vec<PathStep>` from a list of keys, indexes, and JSON filters.
///
/// ```rust
/// use fhir_client::document::PathStep;
/// use fhir_client::path;
///
/// let steps = path!["name", 0, "given"];
/// assert_eq!(steps[1], PathStep::Index(0));
/// ```
#[macro_export]
macro_rules! path {
    ($($step:expr),* $(,)?) => {
        vec![$($crate::document::PathStep::from($step)),*]
    };
}

/// Errors raised by [`set_by_path`] and [`parse_path`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path itself is unusable.
    #[error("Malformed path '{path}': {reason}")]
    Malformed {
        /// The offending path.
        path: String,
        /// Why the path was rejected.
        reason: String,
    },

    /// A step addresses something that does not exist and cannot be created.
    #[error("Cannot resolve path step '{step}': {reason}")]
    Lookup {
        /// The step that failed.
        step: String,
        /// What was found instead.
        reason: String,
    },
}

/// Parses a dotted path such as `name.0.given`.
///
/// All-digit segments become [`PathStep::Index`]; everything else becomes a
/// [`PathStep::Key`].
///
/// # Errors
///
/// Returns [`PathError::Malformed`] for an empty path or an empty segment.
///
/// # Example
///
/// ```rust
/// use fhir_client::document::{parse_path, PathStep};
///
/// let steps = parse_path("name.0.given").unwrap();
/// assert_eq!(steps, vec![
///     PathStep::Key("name".into()),
///     PathStep::Index(0),
///     PathStep::Key("given".into()),
/// ]);
/// ```
pub fn parse_path(path: &str) -> Result<Vec<PathStep>, PathError> {
    if path.is_empty() {
        return Err(PathError::Malformed {
            path: String::new(),
            reason: "path is empty".to_string(),
        });
    }

    path.split('.')
        .map(|segment| {
            if segment.is_empty() {
                return Err(PathError::Malformed {
                    path: path.to_string(),
                    reason: "path contains an empty segment".to_string(),
                });
            }
            if segment.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(index) = segment.parse::<usize>() {
                    return Ok(PathStep::Index(index));
                }
            }
            Ok(PathStep::Key(segment.to_string()))
        })
        .collect()
}

/// Returns the value at `path`, or `None` if any step cannot be resolved.
///
/// Traversal stops with `None` when a key or index is missing, when a step
/// does not fit the current value (an index into an object, a key into an
/// array), when an intermediate value is `null`, or when a filter matches no
/// element. A final `null` is returned as `Some(&Value::Null)`. This function
/// never fails.
#[must_use]
pub fn get_by_path<'a>(document: &'a Value, path: &[PathStep]) -> Option<&'a Value> {
    let mut current = document;
    for step in path {
        current = match (step, current) {
            (PathStep::Key(key), Value::Object(object)) => object.get(key)?,
            (PathStep::Index(index), Value::Array(items)) => items.get(*index)?,
            (PathStep::Filter(filter), Value::Array(items)) => items
                .iter()
                .find(|item| PathStep::matches(filter, item))?,
            _ => return None,
        };
    }
    Some(current)
}

/// Returns the value at `path`, or `default` if it cannot be resolved.
#[must_use]
pub fn get_by_path_or<'a>(
    document: &'a Value,
    path: &[PathStep],
    default: &'a Value,
) -> &'a Value {
    get_by_path(document, path).unwrap_or(default)
}

/// Assigns `value` at `path`, creating missing intermediate containers.
///
/// A missing object member is created as an object, or as an array when the
/// following step is an index or a filter. An index equal to the array length
/// appends; a `null` intermediate is replaced by the container the next step
/// needs. Filters never create elements.
///
/// # Errors
///
/// - [`PathError::Malformed`] if `path` is empty.
/// - [`PathError::Lookup`] if an index is past the end of an array, a filter
///   matches no element, or a step does not fit the value it is applied to.
///
/// On error `document` is left unchanged.
pub fn set_by_path(
    document: &mut Value,
    path: &[PathStep],
    value: Value,
) -> Result<(), PathError> {
    let mut draft = document.clone();
    write_path(&mut draft, path, value)?;
    *document = draft;
    Ok(())
}

fn write_path(document: &mut Value, path: &[PathStep], value: Value) -> Result<(), PathError> {
    let Some((last, parents)) = path.split_last() else {
        return Err(PathError::Malformed {
            path: String::new(),
            reason: "path is empty".to_string(),
        });
    };

    let mut current = document;
    for (position, step) in parents.iter().enumerate() {
        let next = &path[position + 1];
        current = descend(current, step, || container_for(next))?;
    }

    if current.is_null() {
        *current = container_for(last);
    }

    match (last, current) {
        (PathStep::Key(key), Value::Object(object)) => {
            object.insert(key.clone(), value);
            Ok(())
        }
        (PathStep::Index(index), Value::Array(items)) => {
            if *index < items.len() {
                items[*index] = value;
                Ok(())
            } else if *index == items.len() {
                items.push(value);
                Ok(())
            } else {
                Err(index_out_of_range(*index, items.len()))
            }
        }
        (PathStep::Filter(filter), Value::Array(items)) => {
            let slot = items
                .iter_mut()
                .find(|item| PathStep::matches(filter, item))
                .ok_or_else(|| no_filter_match(last))?;
            *slot = value;
            Ok(())
        }
        (step, other) => Err(mismatch(step, other)),
    }
}

fn container_for(next: &PathStep) -> Value {
    match next {
        PathStep::Key(_) => Value::Object(Map::new()),
        PathStep::Index(_) | PathStep::Filter(_) => Value::Array(Vec::new()),
    }
}

fn descend<'a>(
    current: &'a mut Value,
    step: &PathStep,
    make: impl FnOnce() -> Value,
) -> Result<&'a mut Value, PathError> {
    if current.is_null() {
        *current = container_for(step);
    }

    let slot = match (step, current) {
        (PathStep::Key(key), Value::Object(object)) => {
            object.entry(key.clone()).or_insert(Value::Null)
        }
        (PathStep::Index(index), Value::Array(items)) => {
            let len = items.len();
            if *index == len {
                items.push(Value::Null);
            }
            items
                .get_mut(*index)
                .ok_or_else(|| index_out_of_range(*index, len))?
        }
        (PathStep::Filter(filter), Value::Array(items)) => items
            .iter_mut()
            .find(|item| PathStep::matches(filter, item))
            .ok_or_else(|| no_filter_match(step))?,
        (step, other) => return Err(mismatch(step, other)),
    };

    if slot.is_null() {
        *slot = make();
    }
    Ok(slot)
}

fn index_out_of_range(index: usize, len: usize) -> PathError {
    PathError::Lookup {
        step: index.to_string(),
        reason: format!("index out of range for array of length {len}"),
    }
}

fn no_filter_match(step: &PathStep) -> PathError {
    PathError::Lookup {
        step: step.to_string(),
        reason: "no array element matches the filter".to_string(),
    }
}

fn mismatch(step: &PathStep, found: &Value) -> PathError {
    let kind = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    PathError::Lookup {
        step: step.to_string(),
        reason: format!("cannot apply this step to {kind}"),
    }
}
