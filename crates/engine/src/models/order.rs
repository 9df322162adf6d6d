//! Order and line item models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use shopsync_core::{CustomerId, ExternalId, LineItemId, OrderId, ProductId, TenantId, VariantId};

/// Decoded upstream order with its line items.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub external_id: ExternalId,
    /// External id of the ordering customer, resolved locally at reconcile time.
    pub customer_external_id: Option<ExternalId>,
    pub order_number: Option<String>,
    pub email: Option<String>,
    pub total_price: Decimal,
    pub subtotal_price: Decimal,
    pub total_tax: Decimal,
    pub total_discounts: Decimal,
    pub currency: Option<String>,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub tags: Vec<String>,
    pub note: Option<String>,
    pub shipping_address: Option<serde_json::Value>,
    pub billing_address: Option<serde_json::Value>,
    pub processed_at: Option<DateTime<Utc>>,
    pub line_items: Vec<LineItemRecord>,
}

/// Decoded upstream line item.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemRecord {
    /// Stable key within the order: the external id, or `pos-<index>`.
    pub line_key: String,
    pub external_id: Option<ExternalId>,
    pub product_external_id: Option<ExternalId>,
    pub variant_external_id: Option<ExternalId>,
    pub title: String,
    pub quantity: i32,
    pub price: Decimal,
    pub total_discount: Decimal,
    pub sku: Option<String>,
    pub vendor: Option<String>,
}

/// Stored order.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub tenant_id: TenantId,
    pub external_id: ExternalId,
    /// `None` when the customer link did not resolve locally.
    pub customer_id: Option<CustomerId>,
    pub order_number: Option<String>,
    pub email: Option<String>,
    pub total_price: Decimal,
    pub subtotal_price: Decimal,
    pub total_tax: Decimal,
    pub total_discounts: Decimal,
    pub currency: Option<String>,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub tags: Vec<String>,
    pub note: Option<String>,
    pub shipping_address: Option<serde_json::Value>,
    pub billing_address: Option<serde_json::Value>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item ready to be written, with local linkage resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub line_key: String,
    pub external_id: Option<ExternalId>,
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub title: String,
    pub quantity: i32,
    pub price: Decimal,
    pub total_discount: Decimal,
    pub sku: Option<String>,
    pub vendor: Option<String>,
    /// Whether the referenced product resolved locally.
    pub product_exists: bool,
}

/// Stored line item.
#[derive(Debug, Clone)]
pub struct LineItem {
    pub id: LineItemId,
    pub order_id: OrderId,
    pub item: NewLineItem,
}
