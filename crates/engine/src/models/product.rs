//! Product and variant models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use shopsync_core::{ExternalId, ProductId, TenantId, VariantId};

/// Decoded upstream product with its variants.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub external_id: ExternalId,
    pub title: String,
    pub handle: Option<String>,
    /// HTML body.
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub status: Option<String>,
    pub tags: Vec<String>,
    /// Image objects as delivered upstream (always a JSON array).
    pub images: serde_json::Value,
    /// Never empty: a product without variants gets a synthetic default.
    pub variants: Vec<VariantRecord>,
}

/// Decoded upstream variant.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub external_id: ExternalId,
    pub title: String,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub inventory_quantity: i64,
    pub weight: Option<Decimal>,
    pub weight_unit: Option<String>,
    pub requires_shipping: bool,
    pub taxable: bool,
    pub position: i32,
}

/// Stored product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub external_id: ExternalId,
    pub title: String,
    pub handle: Option<String>,
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub status: Option<String>,
    pub tags: Vec<String>,
    pub images: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored variant, unique per (product, external id).
#[derive(Debug, Clone)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub variant: VariantRecord,
}
