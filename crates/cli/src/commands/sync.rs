//! Manual full sync.
//!
//! # Usage
//!
//! ```bash
//! SHOPIFY_ACCESS_TOKEN=shpat_... shopsync sync --tenant <uuid> --store demo
//! ```
//!
//! Onboards the store first (creating the tenant on first use), then runs a
//! full sync in the foreground. Ctrl+C cancels the run; the job is then
//! marked `failed`.

use std::sync::Arc;

use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use shopsync_core::TenantId;
use shopsync_engine::config::EngineConfig;
use shopsync_engine::db::{self, PgSyncStore, SyncStore};
use shopsync_engine::services::{SyncOrchestrator, onboard_tenant, set_webhook_secret};

use super::{CommandError, print_json};

/// Onboard `store_url` for `tenant_id` and run a full sync.
///
/// A `webhook_secret`, when given, is stored as the tenant's own signing
/// secret.
///
/// # Errors
///
/// Returns an error if configuration, onboarding or the sync fails.
pub async fn full_sync(
    tenant_id: TenantId,
    store_url: &str,
    access_token: SecretString,
    webhook_secret: Option<SecretString>,
) -> Result<(), CommandError> {
    let config = EngineConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    let store: Arc<dyn SyncStore> = Arc::new(PgSyncStore::new(pool));

    let connected = onboard_tenant(store.as_ref(), tenant_id, store_url, access_token.clone()).await?;
    tracing::info!(
        "Store {} connected to tenant {}",
        connected.tenant.shop_domain,
        connected.tenant.id
    );
    if webhook_secret.is_some() {
        set_webhook_secret(store.as_ref(), connected.tenant.id, webhook_secret).await?;
        tracing::info!("Store webhook secret saved");
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling sync");
            on_interrupt.cancel();
        }
    });

    let orchestrator =
        SyncOrchestrator::new(store, config.shopify.client_config(), config.sync);
    let summary = orchestrator
        .perform_full_sync(
            connected.tenant.id,
            &connected.tenant.shop_domain,
            access_token,
            cancel,
        )
        .await?;

    print_json(&summary)
}
