//! Tenant and connected store models.

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use shopsync_core::{StoreId, TenantId};

/// An isolated account of this system, mapped 1:1 to a connected store.
///
/// Implements `Debug` manually to redact credentials.
#[derive(Clone)]
pub struct Tenant {
    pub id: TenantId,
    /// Display name.
    pub name: String,
    /// Upstream store domain (unique across tenants).
    pub shop_domain: String,
    /// Admin API access token, set on successful sync setup.
    pub access_token: Option<SecretString>,
    /// Per-tenant webhook signing secret (falls back to the app-level secret).
    pub webhook_secret: Option<SecretString>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tenant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("shop_domain", &self.shop_domain)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// Parameters for creating a tenant.
#[derive(Clone)]
pub struct NewTenant {
    pub id: TenantId,
    pub name: String,
    pub shop_domain: String,
    pub access_token: Option<SecretString>,
}

impl std::fmt::Debug for NewTenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewTenant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// A connected upstream store, keyed by its domain.
#[derive(Debug, Clone)]
pub struct StoreRecord {
    pub id: StoreId,
    pub tenant_id: TenantId,
    pub shop_domain: String,
    pub name: String,
    /// ISO 4217 currency code.
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
