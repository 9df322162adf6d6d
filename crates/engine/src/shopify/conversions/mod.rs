//! Decoding of raw REST payloads into typed records.
//!
//! Upstream JSON is loosely typed: money arrives as strings, ids as numbers
//! in REST bodies and as strings in some webhook bodies, and most fields may
//! be absent or `null`. The rules applied here:
//!
//! - a record without a usable `id` is rejected ([`DecodeError`])
//! - money and quantities default to `0` when absent or non-numeric
//! - optional text stays `None` when absent, `null` or blank
//! - `tags` is a comma-separated string, split and trimmed

mod customers;
mod orders;
mod products;

pub use customers::{decode_address, decode_addresses, decode_customer};
pub use orders::decode_order;
pub use products::{DEFAULT_VARIANT_ID, DEFAULT_VARIANT_TITLE, decode_product};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;

use shopsync_core::ExternalId;

/// A payload that cannot be turned into a record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is not a JSON object.
    #[error("{0} payload is not an object")]
    NotAnObject(&'static str),

    /// A required identifier is absent or unusable.
    #[error("{entity} payload is missing `{field}`")]
    MissingId {
        entity: &'static str,
        field: &'static str,
    },
}

// =============================================================================
// Field helpers
// =============================================================================

fn as_object<'a>(
    value: &'a Value,
    entity: &'static str,
) -> Result<&'a Map<String, Value>, DecodeError> {
    value.as_object().ok_or(DecodeError::NotAnObject(entity))
}

fn required_id(
    obj: &Map<String, Value>,
    entity: &'static str,
    field: &'static str,
) -> Result<ExternalId, DecodeError> {
    obj.get(field)
        .and_then(ExternalId::from_json)
        .ok_or(DecodeError::MissingId { entity, field })
}

fn optional_id(obj: &Map<String, Value>, field: &str) -> Option<ExternalId> {
    obj.get(field).and_then(ExternalId::from_json)
}

fn text(obj: &Map<String, Value>, field: &str) -> Option<String> {
    match obj.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// Money or measurement field, `0` when absent or non-numeric.
fn decimal(obj: &Map<String, Value>, field: &str) -> Decimal {
    optional_decimal(obj, field).unwrap_or(Decimal::ZERO)
}

fn optional_decimal(obj: &Map<String, Value>, field: &str) -> Option<Decimal> {
    obj.get(field).and_then(parse_decimal)
}

#[allow(clippy::cast_possible_truncation)]
fn integer(obj: &Map<String, Value>, field: &str) -> i64 {
    match obj.get(field) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Count field narrowed to `i32`, saturating at the bounds.
fn count(obj: &Map<String, Value>, field: &str) -> i32 {
    let value = integer(obj, field);
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

fn boolean(obj: &Map<String, Value>, field: &str, default: bool) -> bool {
    match obj.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.trim() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        _ => default,
    }
}

fn tags(obj: &Map<String, Value>) -> Vec<String> {
    match obj.get("tags") {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn timestamp(obj: &Map<String, Value>, field: &str) -> Option<DateTime<Utc>> {
    let raw = obj.get(field)?.as_str()?;
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn json_blob(obj: &Map<String, Value>, field: &str) -> Option<Value> {
    obj.get(field).filter(|v| !v.is_null()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: &Value) -> &Map<String, Value> {
        value.as_object().expect("object")
    }

    #[test]
    fn test_decimal_defaults_to_zero() {
        let value = json!({"a": "12.30", "b": 7, "c": "abc", "d": null});
        let o = obj(&value);
        assert_eq!(decimal(o, "a"), "12.30".parse::<Decimal>().expect("decimal"));
        assert_eq!(decimal(o, "b"), Decimal::from(7));
        assert_eq!(decimal(o, "c"), Decimal::ZERO);
        assert_eq!(decimal(o, "d"), Decimal::ZERO);
        assert_eq!(decimal(o, "missing"), Decimal::ZERO);
    }

    #[test]
    fn test_count_accepts_numbers_and_strings() {
        let value = json!({"a": 3, "b": "4", "c": "x", "d": 1e12});
        let o = obj(&value);
        assert_eq!(count(o, "a"), 3);
        assert_eq!(count(o, "b"), 4);
        assert_eq!(count(o, "c"), 0);
        assert_eq!(count(o, "d"), i32::MAX);
    }

    #[test]
    fn test_tags_split_and_trim() {
        let value = json!({"tags": "vip,  wholesale , ,repeat"});
        assert_eq!(tags(obj(&value)), vec!["vip", "wholesale", "repeat"]);

        let empty = json!({"tags": ""});
        assert!(tags(obj(&empty)).is_empty());
    }

    #[test]
    fn test_text_drops_blank() {
        let value = json!({"a": "  ", "b": "x", "c": 1001});
        let o = obj(&value);
        assert_eq!(text(o, "a"), None);
        assert_eq!(text(o, "b").as_deref(), Some("x"));
        assert_eq!(text(o, "c").as_deref(), Some("1001"));
    }

    #[test]
    fn test_timestamp_parses_offsets() {
        let value = json!({"at": "2024-03-01T10:00:00-05:00", "bad": "yesterday"});
        let o = obj(&value);
        let at = timestamp(o, "at").expect("timestamp");
        assert_eq!(at.to_rfc3339(), "2024-03-01T15:00:00+00:00");
        assert_eq!(timestamp(o, "bad"), None);
    }
}
