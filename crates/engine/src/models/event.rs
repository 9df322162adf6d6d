//! Lightweight behavioral events recorded from webhooks.

use chrono::{DateTime, Utc};

use shopsync_core::{CustomEventId, CustomerId, TenantId};

/// Parameters for recording an event.
#[derive(Debug, Clone)]
pub struct NewCustomEvent {
    pub tenant_id: TenantId,
    pub customer_id: Option<CustomerId>,
    pub session_id: Option<String>,
    /// Event tag, e.g. `cart_created`.
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Stored event.
#[derive(Debug, Clone)]
pub struct CustomEvent {
    pub id: CustomEventId,
    pub tenant_id: TenantId,
    pub customer_id: Option<CustomerId>,
    pub session_id: Option<String>,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}
