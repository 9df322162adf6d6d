//! Tenant onboarding: connect a store domain and credential to a tenant.

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument};

use shopsync_core::TenantId;

use crate::db::{RepositoryError, SyncStore};
use crate::error::SyncError;
use crate::models::{NewTenant, StoreRecord, Tenant};
use crate::shopify::normalize_store_domain;

/// A tenant and its store after onboarding.
#[derive(Debug, Clone)]
pub struct ConnectedStore {
    pub tenant: Tenant,
    pub store: StoreRecord,
    /// Whether the tenant row was created by this call.
    pub created: bool,
}

/// Connect `store_url` to `tenant_id`, storing the access credential.
///
/// The URL is normalized to a bare store domain first. A new tenant is created
/// with the caller's id; an existing tenant for the domain gets the new
/// credential and is marked active. The store record is created or refreshed.
///
/// # Errors
///
/// - `Validation` for an empty credential, an unusable URL, or a domain owned
///   by a different tenant
/// - `Repository` for store failures
#[instrument(skip(store, access_token), fields(tenant_id = %tenant_id))]
pub async fn onboard_tenant(
    store: &dyn SyncStore,
    tenant_id: TenantId,
    store_url: &str,
    access_token: SecretString,
) -> Result<ConnectedStore, SyncError> {
    let shop_domain = normalize_store_domain(store_url)?;
    if access_token.expose_secret().trim().is_empty() {
        return Err(SyncError::Validation("access token is required".to_string()));
    }

    let (tenant, created) = match store.find_tenant_by_domain(&shop_domain).await? {
        Some(existing) if existing.id != tenant_id => {
            return Err(SyncError::Validation(format!(
                "store {shop_domain} is already connected to another tenant"
            )));
        }
        Some(existing) => (
            store
                .update_tenant_credential(existing.id, &access_token)
                .await?,
            false,
        ),
        None => {
            let new_tenant = NewTenant {
                id: tenant_id,
                name: format!("Store {shop_domain}"),
                shop_domain: shop_domain.clone(),
                access_token: Some(access_token),
            };
            let tenant = store.insert_tenant(&new_tenant).await.map_err(|e| match e {
                RepositoryError::Conflict(_) => SyncError::Validation(format!(
                    "tenant {tenant_id} is already connected to another store"
                )),
                other => SyncError::Repository(other),
            })?;
            (tenant, true)
        }
    };

    let store_record = store.upsert_store(tenant.id, &shop_domain).await?;
    info!(shop_domain = %shop_domain, created, "Store connected");

    Ok(ConnectedStore {
        tenant,
        store: store_record,
        created,
    })
}

/// Set or clear the tenant's own webhook signing secret.
///
/// Deliveries for the tenant are verified with this secret instead of the
/// app-level one while it is set.
///
/// # Errors
///
/// - `Validation` for a blank secret
/// - `TenantNotFound` for an unknown tenant
/// - `Repository` for store failures
#[instrument(skip(store, webhook_secret), fields(tenant_id = %tenant_id))]
pub async fn set_webhook_secret(
    store: &dyn SyncStore,
    tenant_id: TenantId,
    webhook_secret: Option<SecretString>,
) -> Result<Tenant, SyncError> {
    if webhook_secret
        .as_ref()
        .is_some_and(|s| s.expose_secret().trim().is_empty())
    {
        return Err(SyncError::Validation("webhook secret is blank".to_string()));
    }

    let tenant = store
        .set_tenant_webhook_secret(tenant_id, webhook_secret.as_ref())
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => SyncError::TenantNotFound(tenant_id.to_string()),
            other => SyncError::Repository(other),
        })?;
    info!(enabled = webhook_secret.is_some(), "Tenant webhook secret updated");
    Ok(tenant)
}
