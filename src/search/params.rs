//! Query Parameter Encoder.
//!
//! Turns high-level search filters of the form
//! `field[__Type__subfield...][__modifier]` into FHIR query-string pairs.
//!
//! # Key Grammar
//!
//! - `_` in field names becomes `-` (`address_state` → `address-state`),
//!   except for names starting with `_` or `.` (`_id`, `_has:...`).
//! - A trailing modifier (`contains`, `exact`, `missing`, `not`, `below`,
//!   `above`, `in`, `not_in`, `text`, `of_type`) is appended as `:modifier`
//!   with `_` rendered as `-`.
//! - A trailing comparison prefix (`eq`, `ne`, `gt`, `ge`, `lt`, `le`, `sa`,
//!   `eb`, `ap`) is prepended to every value (`period__ge` → `period=ge…`).
//! - `field__Type__subfield` chains through a reference
//!   (`patient:Patient.name`); `field__subfield` without a capitalized type
//!   becomes `field.subfield`; a trailing capitalized segment is a type
//!   modifier (`subject__Patient` → `subject:Patient`).
//!
//! # Values
//!
//! See [`SearchValue`]. Lists expand into repeated parameters; pass a
//! pre-joined string to send a single comma-separated value. A
//! [`SearchValue::Raw`] value skips every transformation, including the key.
//!
//! # Example
//!
//! ```rust
//! use fhir_client::search::encode_search_param;
//!
//! let pairs = encode_search_param("patient__Patient__birth_date__ge", &"2000".into()).unwrap();
//! assert_eq!(pairs, vec![("patient:Patient.birth-date".to_string(), "ge2000".to_string())]);
//!
//! let pairs = encode_search_param("status__not", &vec!["failed", "completed"].into()).unwrap();
//! assert_eq!(pairs.len(), 2);
//! assert_eq!(pairs[0].0, "status:not");
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Modifiers rendered as a `:modifier` suffix on the parameter name.
pub const MODIFIERS: &[&str] = &[
    "contains", "exact", "missing", "not", "below", "above", "in", "not_in", "text", "of_type",
];

/// Comparison prefixes rendered in front of the value.
pub const PREFIXES: &[&str] = &["eq", "ne", "gt", "ge", "lt", "le", "sa", "eb", "ap"];

/// Error raised when a search filter cannot be encoded.
///
/// The error is `Clone` so that a [`SearchSet`](crate::SearchSet) can hold it
/// until a terminal operation surfaces it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Cannot encode search parameter '{field}': {reason}")]
pub struct EncodingError {
    /// The search key as given by the caller.
    pub field: String,
    /// Why the value or key was rejected.
    pub reason: String,
}

impl EncodingError {
    pub(crate) fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A search parameter value.
///
/// Conversions exist from strings, integers, floats, booleans, `chrono`
/// dates and datetimes, vectors of convertible values, and from
/// [`Resource`](crate::Resource) / [`Reference`](crate::Reference) (rendered
/// as `Type/id`).
#[derive(Clone, Debug, PartialEq)]
pub enum SearchValue {
    /// A string, sent unchanged.
    Str(String),
    /// An integer.
    Int(i64),
    /// A decimal.
    Float(f64),
    /// A boolean, rendered as `true` / `false`.
    Bool(bool),
    /// A calendar date, rendered as `YYYY-MM-DD`.
    Date(NaiveDate),
    /// A timezone-aware instant, rendered with its offset (`Z` for UTC).
    DateTime(DateTime<FixedOffset>),
    /// A local date-time without an offset.
    NaiveDateTime(NaiveDateTime),
    /// A reference string such as `Patient/123`. Empty when built from a
    /// resource that has no id yet.
    Reference(String),
    /// Several values, sent as repeated parameters.
    List(Vec<SearchValue>),
    /// A value sent verbatim under a verbatim key.
    Raw(String),
}

impl SearchValue {
    /// Wraps a value that must be sent without any transformation.
    #[must_use]
    pub fn raw(value: impl Into<String>) -> Self {
        Self::Raw(value.into())
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Int(_) => "integer",
            Self::Float(_) => "decimal",
            Self::Bool(_) => "boolean",
            Self::Date(_) => "date",
            Self::DateTime(_) | Self::NaiveDateTime(_) => "datetime",
            Self::Reference(_) => "reference",
            Self::List(_) => "list",
            Self::Raw(_) => "raw value",
        }
    }
}

impl From<&str> for SearchValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for SearchValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for SearchValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i32> for SearchValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for SearchValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for SearchValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for SearchValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for SearchValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for SearchValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for SearchValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::NaiveDateTime(value)
    }
}

impl From<DateTime<FixedOffset>> for SearchValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTime(value)
    }
}

impl From<DateTime<Utc>> for SearchValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value.into())
    }
}

impl<T: Into<Self>> From<Vec<T>> for SearchValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Renames a parameter for the wire: `_` becomes `-` unless the name is
/// reserved (`_id`) or a path expression (`.effectiveDate`).
fn transform_param(param: &str) -> String {
    if param.starts_with('_') || param.starts_with('.') {
        param.to_string()
    } else {
        param.replace('_', "-")
    }
}

fn is_type_segment(segment: &str) -> bool {
    segment.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Builds the wire parameter name and returns it with the trailing operator.
fn parse_key(key: &str) -> Result<(String, Option<&str>), EncodingError> {
    let mut parts: Vec<&str> = key.split("__").collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(EncodingError::new(key, "search key contains an empty segment"));
    }

    let op = match parts.last() {
        Some(last) if parts.len() > 1 && (MODIFIERS.contains(last) || PREFIXES.contains(last)) => {
            parts.pop()
        }
        _ => None,
    };

    let mut segments = parts.into_iter();
    let mut param = segments
        .next()
        .map(str::to_string)
        .ok_or_else(|| EncodingError::new(key, "search key is empty"))?;

    while let Some(segment) = segments.next() {
        if is_type_segment(segment) {
            param.push(':');
            param.push_str(segment);
            if let Some(field) = segments.next() {
                param.push('.');
                param.push_str(field);
            }
        } else {
            param.push('.');
            param.push_str(segment);
        }
    }

    Ok((transform_param(&param), op))
}

fn render(key: &str, op: Option<&str>, value: &SearchValue) -> Result<String, EncodingError> {
    let reject = || {
        EncodingError::new(
            key,
            format!(
                "a {} value cannot be used with the '{}' operator",
                value.kind(),
                op.unwrap_or_default()
            ),
        )
    };

    match (op, value) {
        (Some("missing"), v) if !matches!(v, SearchValue::Bool(_)) => return Err(reject()),
        (Some("contains" | "exact" | "text"), v) if !matches!(v, SearchValue::Str(_)) => {
            return Err(reject())
        }
        (Some(prefix), SearchValue::Bool(_) | SearchValue::Reference(_))
            if PREFIXES.contains(&prefix) =>
        {
            return Err(reject())
        }
        _ => {}
    }

    let rendered = match value {
        SearchValue::Str(s) | SearchValue::Raw(s) => s.clone(),
        SearchValue::Int(i) => i.to_string(),
        SearchValue::Float(f) if !f.is_finite() => {
            return Err(EncodingError::new(key, "a number must be finite"));
        }
        SearchValue::Float(f) => f.to_string(),
        SearchValue::Bool(b) => b.to_string(),
        SearchValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        SearchValue::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        SearchValue::NaiveDateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        SearchValue::Reference(reference) => {
            if reference.is_empty() {
                return Err(EncodingError::new(
                    key,
                    "a resource without an id cannot be used as a reference",
                ));
            }
            reference.clone()
        }
        SearchValue::List(_) => {
            return Err(EncodingError::new(key, "nested lists are not supported"));
        }
    };

    Ok(match op {
        Some(prefix) if PREFIXES.contains(&prefix) => format!("{prefix}{rendered}"),
        _ => rendered,
    })
}

/// Encodes one search filter into wire `(name, value)` pairs.
///
/// A list value yields one pair per element, all with the same name. An
/// empty list yields no pairs. A [`SearchValue::Raw`] value yields `(key,
/// value)` untouched.
///
/// # Errors
///
/// Returns [`EncodingError`] naming `key` when the key is malformed, when a
/// value type is not supported by the key's operator (`missing` needs a
/// boolean, `contains`/`exact`/`text` need a string, comparison prefixes
/// reject booleans and references), when a list is nested, or when a
/// reference has no id.
pub fn encode_search_param(
    key: &str,
    value: &SearchValue,
) -> Result<Vec<(String, String)>, EncodingError> {
    if let SearchValue::Raw(raw) = value {
        return Ok(vec![(key.to_string(), raw.clone())]);
    }

    let (mut param, op) = parse_key(key)?;
    if let Some(modifier) = op.filter(|op| MODIFIERS.contains(op)) {
        param.push(':');
        param.push_str(&modifier.replace('_', "-"));
    }

    let values = match value {
        SearchValue::List(items) => items.iter().collect::<Vec<_>>(),
        single => vec![single],
    };

    values
        .into_iter()
        .map(|v| render(key, op, v).map(|rendered| (param.clone(), rendered)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn encode(key: &str, value: impl Into<SearchValue>) -> Vec<(String, String)> {
        encode_search_param(key, &value.into()).unwrap()
    }

    fn pair(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn test_underscores_become_hyphens() {
        assert_eq!(
            encode("general_practitioner", "prid"),
            vec![pair("general-practitioner", "prid")]
        );
        assert_eq!(encode("address_state", "CA"), vec![pair("address-state", "CA")]);
    }

    #[test]
    fn test_reserved_and_path_names_pass_through() {
        assert_eq!(encode("_id", "1"), vec![pair("_id", "1")]);
        assert_eq!(
            encode("_has:Person:link:id", "id"),
            vec![pair("_has:Person:link:id", "id")]
        );
        assert_eq!(
            encode(".effectiveDate.start$gt", "2019"),
            vec![pair(".effectiveDate.start$gt", "2019")]
        );
    }

    #[test]
    fn test_chained_parameters() {
        assert_eq!(
            encode("patient__Patient__name", "John"),
            vec![pair("patient:Patient.name", "John")]
        );
        assert_eq!(
            encode("patient__Patient__general_practitioner__Organization__name", "Name"),
            vec![pair("patient:Patient.general-practitioner:Organization.name", "Name")]
        );
        assert_eq!(encode("subject__name", "x"), vec![pair("subject.name", "x")]);
        assert_eq!(encode("subject__Patient", "1"), vec![pair("subject:Patient", "1")]);
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(encode("text__contains", "test"), vec![pair("text:contains", "test")]);
        assert_eq!(
            encode("url__not_in", "http://loinc.org"),
            vec![pair("url:not-in", "http://loinc.org")]
        );
        assert_eq!(
            encode("identifier__of_type", "a|b|c"),
            vec![pair("identifier:of-type", "a|b|c")]
        );
        assert_eq!(encode("name__missing", true), vec![pair("name:missing", "true")]);
        assert_eq!(
            encode("patient__Patient__name__exact", "John"),
            vec![pair("patient:Patient.name:exact", "John")]
        );
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(
            encode("patient__Patient__birth_date__ge", "2000"),
            vec![pair("patient:Patient.birth-date", "ge2000")]
        );
        assert_eq!(encode("value_quantity__lt", 5), vec![pair("value-quantity", "lt5")]);
        assert_eq!(
            encode("period__ge", vec!["2018", "2019"]),
            vec![pair("period", "ge2018"), pair("period", "ge2019")]
        );
    }

    #[test]
    fn test_value_types() {
        assert_eq!(encode("active", true), vec![pair("active", "true")]);
        assert_eq!(encode("active", false), vec![pair("active", "false")]);
        assert_eq!(encode("probability", 0.5), vec![pair("probability", "0.5")]);
        assert_eq!(
            encode("birthdate", NaiveDate::from_ymd_opt(2019, 1, 2).unwrap()),
            vec![pair("birthdate", "2019-01-02")]
        );
        assert_eq!(
            encode("date", Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()),
            vec![pair("date", "2019-01-01T00:00:00Z")]
        );
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            encode("date", offset.with_ymd_and_hms(2019, 1, 1, 10, 30, 0).unwrap()),
            vec![pair("date", "2019-01-01T10:30:00+02:00")]
        );
        let naive = NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        assert_eq!(encode("date", naive), vec![pair("date", "2019-01-01T08:00:00")]);
        assert_eq!(
            encode("subject", SearchValue::Reference("Patient/1".into())),
            vec![pair("subject", "Patient/1")]
        );
    }

    #[test]
    fn test_lists_repeat_and_strings_stay_joined() {
        assert_eq!(
            encode("name", vec!["John", "Rivera"]),
            vec![pair("name", "John"), pair("name", "Rivera")]
        );
        assert_eq!(
            encode("name", "family1,family2"),
            vec![pair("name", "family1,family2")]
        );
        assert!(encode("name", Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_raw_bypasses_everything() {
        assert_eq!(
            encode("general_practitioner__ge", SearchValue::raw("x_y")),
            vec![pair("general_practitioner__ge", "x_y")]
        );
    }

    #[test]
    fn test_unsupported_values_name_the_field() {
        let cases: Vec<(&str, SearchValue)> = vec![
            ("name__missing", "yes".into()),
            ("name__contains", 5.into()),
            ("birthdate__ge", true.into()),
            ("subject__eq", SearchValue::Reference("Patient/1".into())),
            ("subject", SearchValue::Reference(String::new())),
            ("name", SearchValue::List(vec![SearchValue::List(vec![])])),
            ("name____x", "a".into()),
            ("probability", f64::NAN.into()),
            ("value_quantity__gt", f64::INFINITY.into()),
        ];
        for (key, value) in cases {
            let error = encode_search_param(key, &value).unwrap_err();
            assert_eq!(error.field, key);
            assert!(error.to_string().contains(key));
        }
    }
}
