//! Typed JSON values on the REST surface.
//!
//! Plain JSON cannot carry dates or object ids, so REST bodies use tagged
//! single-key objects:
//!
//! ```text
//! {"$date": "2024-05-01T12:00:00+02:00"}  →  {"$date": "2024-05-01T10:00:00Z"}
//! {"$date": 1714557600000}                →  {"$date": "2024-05-01T10:00:00Z"}
//! {"$oid": "65F1C0DEADBEEF0123456789"}    →  {"$oid": "65f1c0deadbeef0123456789"}
//! ```
//!
//! [`normalize`] validates every tagged value in a request body and brings
//! it to canonical form (UTC dates, lowercase ids) before the body reaches a
//! resource. Responses already hold canonical values and are sent unchanged.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::AccessError;

pub const DATE_TAG: &str = "$date";
pub const OID_TAG: &str = "$oid";

/// Byte length of an object id.
const OID_BYTES: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid $date value: {0}")]
    InvalidDate(String),

    #[error("invalid $oid value: {0}")]
    InvalidObjectId(String),
}

impl From<CodecError> for AccessError {
    fn from(err: CodecError) -> Self {
        AccessError::Validation(err.to_string())
    }
}

/// Validate and canonicalize every tagged value in `value`.
pub fn normalize(value: Value) -> Result<Value, CodecError> {
    match value {
        Value::Object(object) => normalize_object(object),
        Value::Array(items) => items
            .into_iter()
            .map(normalize)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Ok(other),
    }
}

fn normalize_object(object: Map<String, Value>) -> Result<Value, CodecError> {
    if object.len() == 1 {
        if let Some(raw) = object.get(DATE_TAG) {
            return Ok(date_value(parse_date(raw)?));
        }
        if let Some(raw) = object.get(OID_TAG) {
            return Ok(oid_value(&parse_object_id(raw)?));
        }
    }

    object
        .into_iter()
        .map(|(key, value)| normalize(value).map(|value| (key, value)))
        .collect::<Result<Map<_, _>, _>>()
        .map(Value::Object)
}

/// `{"$date": "<RFC 3339 UTC>"}`.
pub fn date_value(date: DateTime<Utc>) -> Value {
    let mut object = Map::new();
    object.insert(
        DATE_TAG.to_string(),
        Value::String(date.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    );
    Value::Object(object)
}

/// `{"$oid": "<24 lowercase hex digits>"}`.
pub fn oid_value(id: &str) -> Value {
    let mut object = Map::new();
    object.insert(OID_TAG.to_string(), Value::String(id.to_ascii_lowercase()));
    Value::Object(object)
}

/// Accepts an RFC 3339 string or integer milliseconds since the epoch.
fn parse_date(raw: &Value) -> Result<DateTime<Utc>, CodecError> {
    match raw {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|e| CodecError::InvalidDate(format!("'{}': {}", text, e))),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .ok_or_else(|| CodecError::InvalidDate(number.to_string())),
        other => Err(CodecError::InvalidDate(other.to_string())),
    }
}

fn parse_object_id(raw: &Value) -> Result<String, CodecError> {
    let text = raw
        .as_str()
        .ok_or_else(|| CodecError::InvalidObjectId(raw.to_string()))?;
    match hex::decode(text) {
        Ok(bytes) if bytes.len() == OID_BYTES => Ok(text.to_string()),
        _ => Err(CodecError::InvalidObjectId(format!(
            "'{}' is not {} hex digits",
            text,
            OID_BYTES * 2
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dates_become_utc() {
        let value = normalize(json!({"at": {"$date": "2024-05-01T12:00:00+02:00"}})).unwrap();
        assert_eq!(value, json!({"at": {"$date": "2024-05-01T10:00:00Z"}}));

        let millis = normalize(json!({"$date": 1714557600000_i64})).unwrap();
        assert_eq!(millis, json!({"$date": "2024-05-01T10:00:00Z"}));
    }

    #[test]
    fn test_object_ids_are_lowercased() {
        let value = normalize(json!([{"$oid": "65F1C0DEADBEEF0123456789"}])).unwrap();
        assert_eq!(value, json!([{"$oid": "65f1c0deadbeef0123456789"}]));
    }

    #[test]
    fn test_invalid_tagged_values() {
        assert!(matches!(
            normalize(json!({"$date": "yesterday"})),
            Err(CodecError::InvalidDate(_))
        ));
        assert!(matches!(
            normalize(json!({"doc": {"$oid": "abc"}})),
            Err(CodecError::InvalidObjectId(_))
        ));
        assert!(matches!(
            normalize(json!({"$oid": 5})),
            Err(CodecError::InvalidObjectId(_))
        ));

        let err: AccessError = CodecError::InvalidDate("x".into()).into();
        assert!(matches!(err, AccessError::Validation(_)));
    }

    #[test]
    fn test_tags_only_apply_to_single_key_objects() {
        let value = json!({"$date": "not a date", "other": 1});
        assert_eq!(normalize(value.clone()).unwrap(), value);
    }

    #[test]
    fn test_plain_values_pass_through() {
        let value = json!({"a": [1, "two", null, {"b": true}]});
        assert_eq!(normalize(value.clone()).unwrap(), value);
    }
}
