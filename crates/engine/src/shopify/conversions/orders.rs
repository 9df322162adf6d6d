//! Order and line item payload decoding.

use serde_json::Value;

use super::{
    DecodeError, as_object, count, decimal, json_blob, optional_id, required_id, tags, text,
    timestamp,
};
use crate::models::{LineItemRecord, OrderRecord};

const ENTITY: &str = "order";
const LINE_ITEM_ENTITY: &str = "line item";

/// Decode a raw order with its line items.
///
/// Line items keep payload order. Each gets a key unique within the order:
/// its external id, or `pos-<index>` when the payload carries none.
///
/// # Errors
///
/// Returns `DecodeError` if the payload or a line item is not an object, or
/// the order has no id.
pub fn decode_order(value: &Value) -> Result<OrderRecord, DecodeError> {
    let obj = as_object(value, ENTITY)?;
    let external_id = required_id(obj, ENTITY, "id")?;

    let customer_external_id = obj
        .get("customer")
        .and_then(Value::as_object)
        .and_then(|customer| optional_id(customer, "id"));

    let line_items = match obj.get("line_items") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| decode_line_item(item, index))
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };

    Ok(OrderRecord {
        external_id,
        customer_external_id,
        order_number: text(obj, "order_number").or_else(|| text(obj, "name")),
        email: text(obj, "email"),
        total_price: decimal(obj, "total_price"),
        subtotal_price: decimal(obj, "subtotal_price"),
        total_tax: decimal(obj, "total_tax"),
        total_discounts: decimal(obj, "total_discounts"),
        currency: text(obj, "currency"),
        financial_status: text(obj, "financial_status"),
        fulfillment_status: text(obj, "fulfillment_status"),
        tags: tags(obj),
        note: text(obj, "note"),
        shipping_address: json_blob(obj, "shipping_address"),
        billing_address: json_blob(obj, "billing_address"),
        processed_at: timestamp(obj, "processed_at"),
        line_items,
    })
}

fn decode_line_item(value: &Value, index: usize) -> Result<LineItemRecord, DecodeError> {
    let obj = as_object(value, LINE_ITEM_ENTITY)?;
    let external_id = optional_id(obj, "id");
    let line_key = external_id
        .as_ref()
        .map_or_else(|| format!("pos-{index}"), ToString::to_string);

    Ok(LineItemRecord {
        line_key,
        external_id,
        product_external_id: optional_id(obj, "product_id"),
        variant_external_id: optional_id(obj, "variant_id"),
        title: text(obj, "title").unwrap_or_default(),
        quantity: count(obj, "quantity"),
        price: decimal(obj, "price"),
        total_discount: decimal(obj, "total_discount"),
        sku: text(obj, "sku"),
        vendor: text(obj, "vendor"),
    })
}
