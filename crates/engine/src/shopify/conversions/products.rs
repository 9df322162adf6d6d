//! Product and variant payload decoding.

use rust_decimal::Decimal;
use serde_json::Value;

use shopsync_core::ExternalId;

use super::{
    DecodeError, as_object, boolean, count, decimal, integer, optional_decimal, required_id, tags,
    text,
};
use crate::models::{ProductRecord, VariantRecord};

const ENTITY: &str = "product";
const VARIANT_ENTITY: &str = "variant";

/// External id of the synthetic variant given to products without variants.
pub const DEFAULT_VARIANT_ID: &str = "default";

/// Title of the synthetic variant.
pub const DEFAULT_VARIANT_TITLE: &str = "Default";

/// Decode a raw product with its variants.
///
/// A product with no variants gets one synthetic [`DEFAULT_VARIANT_ID`]
/// variant priced at zero.
///
/// # Errors
///
/// Returns `DecodeError` if the payload is not an object, has no id, or
/// carries a variant without an id.
pub fn decode_product(value: &Value) -> Result<ProductRecord, DecodeError> {
    let obj = as_object(value, ENTITY)?;
    let external_id = required_id(obj, ENTITY, "id")?;

    let mut variants = match obj.get("variants") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, v)| decode_variant(v, index))
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };
    if variants.is_empty() {
        variants.push(default_variant());
    }

    let images = match obj.get("images") {
        Some(images @ Value::Array(_)) => images.clone(),
        _ => Value::Array(Vec::new()),
    };

    Ok(ProductRecord {
        external_id,
        title: text(obj, "title").unwrap_or_default(),
        handle: text(obj, "handle"),
        description: text(obj, "body_html"),
        vendor: text(obj, "vendor"),
        product_type: text(obj, "product_type"),
        status: text(obj, "status"),
        tags: tags(obj),
        images,
        variants,
    })
}

fn decode_variant(value: &Value, index: usize) -> Result<VariantRecord, DecodeError> {
    let obj = as_object(value, VARIANT_ENTITY)?;
    let fallback_position = i32::try_from(index + 1).unwrap_or(i32::MAX);
    let position = match count(obj, "position") {
        0 => fallback_position,
        p => p,
    };

    Ok(VariantRecord {
        external_id: required_id(obj, VARIANT_ENTITY, "id")?,
        title: text(obj, "title").unwrap_or_else(|| DEFAULT_VARIANT_TITLE.to_string()),
        price: decimal(obj, "price"),
        compare_at_price: optional_decimal(obj, "compare_at_price"),
        sku: text(obj, "sku"),
        barcode: text(obj, "barcode"),
        inventory_quantity: integer(obj, "inventory_quantity"),
        weight: optional_decimal(obj, "weight"),
        weight_unit: text(obj, "weight_unit"),
        requires_shipping: boolean(obj, "requires_shipping", true),
        taxable: boolean(obj, "taxable", true),
        position,
    })
}

fn default_variant() -> VariantRecord {
    VariantRecord {
        external_id: ExternalId::synthetic(DEFAULT_VARIANT_ID),
        title: DEFAULT_VARIANT_TITLE.to_string(),
        price: Decimal::ZERO,
        compare_at_price: None,
        sku: None,
        barcode: None,
        inventory_quantity: 0,
        weight: None,
        weight_unit: None,
        requires_shipping: true,
        taxable: true,
        position: 1,
    }
}
