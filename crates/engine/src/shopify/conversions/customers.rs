//! Customer payload decoding.

use serde_json::{Map, Value};

use super::{DecodeError, as_object, boolean, count, decimal, required_id, tags, text, timestamp};
use crate::models::{AddressRecord, CustomerRecord};

const ENTITY: &str = "customer";

/// Decode a raw customer.
///
/// `addresses` is `Some` only when the payload carries an `addresses` array.
///
/// # Errors
///
/// Returns `DecodeError` if the payload is not an object or has no id.
pub fn decode_customer(value: &Value) -> Result<CustomerRecord, DecodeError> {
    let obj = as_object(value, ENTITY)?;

    let addresses = match obj.get("addresses") {
        Some(Value::Array(items)) => Some(decode_addresses(items)),
        _ => None,
    };

    Ok(CustomerRecord {
        external_id: required_id(obj, ENTITY, "id")?,
        email: text(obj, "email"),
        first_name: text(obj, "first_name"),
        last_name: text(obj, "last_name"),
        phone: text(obj, "phone"),
        accepts_marketing: boolean(obj, "accepts_marketing", false),
        total_spent: decimal(obj, "total_spent"),
        orders_count: count(obj, "orders_count"),
        state: text(obj, "state"),
        tags: tags(obj),
        last_order_at: timestamp(obj, "last_order_date"),
        addresses,
    })
}

/// Decode one address; `None` for anything but an object.
#[must_use]
pub fn decode_address(value: &Value) -> Option<AddressRecord> {
    let obj: &Map<String, Value> = value.as_object()?;

    Some(AddressRecord {
        first_name: text(obj, "first_name"),
        last_name: text(obj, "last_name"),
        company: text(obj, "company"),
        address1: text(obj, "address1"),
        address2: text(obj, "address2"),
        city: text(obj, "city"),
        province: text(obj, "province"),
        country: text(obj, "country"),
        zip: text(obj, "zip"),
        phone: text(obj, "phone"),
        is_default: boolean(obj, "default", false),
    })
}

/// Decode an address list, skipping non-object entries.
#[must_use]
pub fn decode_addresses(values: &[Value]) -> Vec<AddressRecord> {
    values.iter().filter_map(decode_address).collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_customer_coerces_fields() {
        let record = decode_customer(&json!({
            "id": "900",
            "email": "a@b.com",
            "total_spent": "120.50",
            "orders_count": 3,
            "tags": "vip, repeat",
            "accepts_marketing": true,
            "last_order_date": "2024-01-02T03:04:05Z"
        }))
        .expect("decode");

        assert_eq!(record.external_id.as_str(), "900");
        assert_eq!(record.email.as_deref(), Some("a@b.com"));
        assert_eq!(record.total_spent, "120.50".parse::<Decimal>().expect("decimal"));
        assert_eq!(record.orders_count, 3);
        assert_eq!(record.tags, vec!["vip", "repeat"]);
        assert!(record.accepts_marketing);
        assert!(record.last_order_at.is_some());
        assert!(record.addresses.is_none());
    }

    #[test]
    fn test_decode_customer_defaults_missing_numbers() {
        let record = decode_customer(&json!({"id": 7, "total_spent": null})).expect("decode");
        assert_eq!(record.total_spent, Decimal::ZERO);
        assert_eq!(record.orders_count, 0);
        assert!(!record.accepts_marketing);
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_decode_customer_requires_id() {
        assert_eq!(
            decode_customer(&json!({"email": "a@b.com"})),
            Err(DecodeError::MissingId {
                entity: "customer",
                field: "id"
            })
        );
        assert_eq!(
            decode_customer(&json!("oops")),
            Err(DecodeError::NotAnObject("customer"))
        );
    }

    #[test]
    fn test_decode_customer_embedded_addresses() {
        let record = decode_customer(&json!({
            "id": 1,
            "addresses": [
                {"city": "Ottawa", "default": true},
                "not-an-address",
                {"city": "Lyon"}
            ]
        }))
        .expect("decode");

        let addresses = record.addresses.expect("addresses present");
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].city.as_deref(), Some("Ottawa"));
        assert!(addresses[0].is_default);
        assert!(!addresses[1].is_default);
    }

    #[test]
    fn test_decode_customer_empty_address_list_is_present() {
        let record = decode_customer(&json!({"id": 1, "addresses": []})).expect("decode");
        assert_eq!(record.addresses, Some(Vec::new()));
    }
}
