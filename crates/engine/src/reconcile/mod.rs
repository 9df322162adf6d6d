//! Entity reconciliation: merge fetched upstream records into the store.
//!
//! Every batch is processed sequentially in input order. A failure on one
//! record is logged, counted in [`ReconcileStats::errors`] and skipped; it
//! never aborts the rest of the batch. Only cancellation stops a batch early.
//!
//! Identity is (tenant, external id) for customers, products and orders and
//! (product, external id) for variants, so reconciling the same payload twice
//! updates rather than duplicates.

mod customers;
mod orders;
mod products;

use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use shopsync_core::{ExternalId, ReconcileStats, TenantId};

use crate::db::{RepositoryError, SyncStore};
use crate::shopify::AddressSource;
use crate::shopify::conversions::DecodeError;

/// Failure of a single record.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The payload is structurally invalid.
    #[error("invalid payload: {0}")]
    Decode(#[from] DecodeError),

    /// A store operation failed.
    #[error("store error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A batch stopped early because its cancellation token fired.
#[derive(Debug, Error)]
#[error("reconciliation cancelled after {} records", stats.total())]
pub struct ReconcileCancelled {
    /// Counts for the records handled before cancellation.
    pub stats: ReconcileStats,
}

/// Entity kind of a single payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Customer,
    Product,
    Order,
}

impl Entity {
    /// Lowercase name used in logs and webhook outcomes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Product => "product",
            Self::Order => "order",
        }
    }
}

/// Whether a record was inserted or overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Updated,
}

/// Applies upstream records to a [`SyncStore`].
///
/// Borrowing, cheap to construct per batch or per webhook.
pub struct Reconciler<'a> {
    store: &'a dyn SyncStore,
    addresses: Option<&'a dyn AddressSource>,
    cancel: &'a CancellationToken,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler without an address source.
    ///
    /// Customers created from payloads that lack an `addresses` array then get
    /// no addresses.
    #[must_use]
    pub const fn new(store: &'a dyn SyncStore, cancel: &'a CancellationToken) -> Self {
        Self {
            store,
            addresses: None,
            cancel,
        }
    }

    /// Fetch addresses from `source` for new customers whose payload has none.
    #[must_use]
    pub const fn with_address_source(mut self, source: &'a dyn AddressSource) -> Self {
        self.addresses = Some(source);
        self
    }

    /// Reconcile one payload outside of a batch.
    ///
    /// An invalid payload is counted in the returned stats as a batch would
    /// count it. A store failure is returned instead, so the caller can ask
    /// for redelivery.
    ///
    /// # Errors
    ///
    /// Returns the `RepositoryError` that stopped the record.
    pub async fn store_one(
        &self,
        entity: Entity,
        tenant_id: TenantId,
        raw: &Value,
    ) -> Result<ReconcileStats, RepositoryError> {
        let result = match entity {
            Entity::Customer => self.store_customer(tenant_id, raw).await,
            Entity::Product => self.store_product(tenant_id, raw).await,
            Entity::Order => self.store_order(tenant_id, raw).await,
        };

        let mut stats = ReconcileStats::default();
        match result {
            Err(RecordError::Repository(e)) => {
                warn!(
                    entity = entity.as_str(),
                    tenant_id = %tenant_id,
                    error = %e,
                    "Store failed while reconciling record"
                );
                return Err(e);
            }
            other => tally(&mut stats, entity.as_str(), tenant_id, raw, other),
        }
        Ok(stats)
    }

    fn ensure_running(&self, stats: ReconcileStats) -> Result<(), ReconcileCancelled> {
        if self.cancel.is_cancelled() {
            return Err(ReconcileCancelled { stats });
        }
        Ok(())
    }
}

/// Fold one record result into the batch counters.
fn tally(
    stats: &mut ReconcileStats,
    entity: &'static str,
    tenant_id: TenantId,
    raw: &Value,
    result: Result<Outcome, RecordError>,
) {
    match result {
        Ok(Outcome::Created) => stats.created += 1,
        Ok(Outcome::Updated) => stats.updated += 1,
        Err(e) => {
            stats.errors += 1;
            let external_id = raw
                .get("id")
                .and_then(ExternalId::from_json)
                .map_or_else(|| "<missing>".to_string(), |id| id.to_string());
            warn!(
                entity,
                tenant_id = %tenant_id,
                external_id,
                error = %e,
                "Failed to reconcile record"
            );
        }
    }
}
