//! Customer reconciliation.

use serde_json::Value;
use tracing::{debug, info, instrument};

use shopsync_core::{ReconcileStats, TenantId};

use super::{Outcome, ReconcileCancelled, Reconciler, RecordError, tally};
use crate::shopify::conversions::{decode_addresses, decode_customer};

impl Reconciler<'_> {
    /// Upsert a batch of raw customers.
    ///
    /// Addresses are replaced whenever the payload carries an `addresses`
    /// array. A new customer without one gets its address book from the
    /// address source, if any; an existing customer without one keeps its
    /// stored addresses.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileCancelled` if the cancellation token fires; per-record
    /// failures are only counted.
    #[instrument(skip(self, raw), fields(tenant_id = %tenant_id, count = raw.len()))]
    pub async fn store_customers(
        &self,
        tenant_id: TenantId,
        raw: &[Value],
    ) -> Result<ReconcileStats, ReconcileCancelled> {
        let mut stats = ReconcileStats::default();

        for item in raw {
            self.ensure_running(stats)?;
            let result = self.store_customer(tenant_id, item).await;
            tally(&mut stats, "customer", tenant_id, item, result);
        }

        info!(
            created = stats.created,
            updated = stats.updated,
            errors = stats.errors,
            "Reconciled customers"
        );
        Ok(stats)
    }

    pub(super) async fn store_customer(
        &self,
        tenant_id: TenantId,
        raw: &Value,
    ) -> Result<Outcome, RecordError> {
        let record = decode_customer(raw)?;

        if let Some(id) = self
            .store
            .find_customer_id(tenant_id, &record.external_id)
            .await?
        {
            self.store.update_customer(id, &record).await?;
            if let Some(addresses) = &record.addresses {
                self.store.replace_customer_addresses(id, addresses).await?;
            }
            return Ok(Outcome::Updated);
        }

        let id = self.store.insert_customer(tenant_id, &record).await?;

        let addresses = match (&record.addresses, self.addresses) {
            (Some(embedded), _) => embedded.clone(),
            (None, Some(source)) => decode_addresses(
                &source
                    .customer_addresses(&record.external_id, self.cancel)
                    .await,
            ),
            (None, None) => Vec::new(),
        };
        if !addresses.is_empty() {
            debug!(
                external_id = %record.external_id,
                count = addresses.len(),
                "Storing customer addresses"
            );
            self.store.replace_customer_addresses(id, &addresses).await?;
        }

        Ok(Outcome::Created)
    }
}
