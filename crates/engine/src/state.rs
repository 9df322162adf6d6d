//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::{EngineConfig, ShopifyConfig, SyncConfig};
use crate::db::{PgSyncStore, SyncStore};
use crate::services::sync::SyncOrchestrator;
use crate::services::webhooks::WebhookProcessor;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// store, the sync orchestrator and the webhook processor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn SyncStore>,
    pool: Option<PgPool>,
    orchestrator: SyncOrchestrator,
    webhooks: WebhookProcessor,
}

impl AppState {
    /// Create state backed by `PostgreSQL`.
    #[must_use]
    pub fn from_config(config: &EngineConfig, pool: PgPool) -> Self {
        let store: Arc<dyn SyncStore> = Arc::new(PgSyncStore::new(pool.clone()));
        Self::new(store, Some(pool), &config.shopify, config.sync.clone())
    }

    /// Create state around any store.
    ///
    /// `pool` is only used by the readiness probe; without one the probe
    /// always succeeds.
    #[must_use]
    pub fn new(
        store: Arc<dyn SyncStore>,
        pool: Option<PgPool>,
        shopify: &ShopifyConfig,
        sync: SyncConfig,
    ) -> Self {
        let orchestrator =
            SyncOrchestrator::new(Arc::clone(&store), shopify.client_config(), sync);
        let webhooks = WebhookProcessor::new(Arc::clone(&store), shopify.webhook_secret.clone());

        Self {
            inner: Arc::new(AppStateInner {
                store,
                pool,
                orchestrator,
                webhooks,
            }),
        }
    }

    /// Get the repository handle.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.inner.store
    }

    /// Get the database pool, if the state is backed by `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get the full-sync orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.inner.orchestrator
    }

    /// Get the webhook processor.
    #[must_use]
    pub fn webhooks(&self) -> &WebhookProcessor {
        &self.inner.webhooks
    }
}
