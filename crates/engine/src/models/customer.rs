//! Customer models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use shopsync_core::{AddressId, CustomerId, ExternalId, TenantId};

/// Decoded upstream customer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub external_id: ExternalId,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub accepts_marketing: bool,
    /// Cumulative spend; `0` when absent or non-numeric upstream.
    pub total_spent: Decimal,
    /// Cumulative order count; `0` when absent or non-numeric upstream.
    pub orders_count: i32,
    /// Lifecycle state tag (`enabled`, `disabled`, `invited`, ...).
    pub state: Option<String>,
    pub tags: Vec<String>,
    pub last_order_at: Option<DateTime<Utc>>,
    /// Addresses embedded in the payload.
    ///
    /// `None` means the payload did not carry an `addresses` field at all,
    /// which is different from an explicitly empty list.
    pub addresses: Option<Vec<AddressRecord>>,
}

/// Decoded upstream customer address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressRecord {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub zip: Option<String>,
    pub phone: Option<String>,
    pub is_default: bool,
}

/// Stored customer.
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: CustomerId,
    pub tenant_id: TenantId,
    pub external_id: ExternalId,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub accepts_marketing: bool,
    pub total_spent: Decimal,
    pub orders_count: i32,
    pub state: Option<String>,
    pub tags: Vec<String>,
    pub last_order_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored customer address.
#[derive(Debug, Clone)]
pub struct CustomerAddress {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub address: AddressRecord,
}
