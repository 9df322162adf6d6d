//! Product and variant reconciliation.

use serde_json::Value;
use tracing::{info, instrument};

use shopsync_core::{ReconcileStats, TenantId};

use super::{Outcome, ReconcileCancelled, Reconciler, RecordError, tally};
use crate::shopify::conversions::decode_product;

impl Reconciler<'_> {
    /// Upsert a batch of raw products and their variants.
    ///
    /// Variants are upserted by (product, external id); variants missing from
    /// the payload are left in place.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileCancelled` if the cancellation token fires.
    #[instrument(skip(self, raw), fields(tenant_id = %tenant_id, count = raw.len()))]
    pub async fn store_products(
        &self,
        tenant_id: TenantId,
        raw: &[Value],
    ) -> Result<ReconcileStats, ReconcileCancelled> {
        let mut stats = ReconcileStats::default();

        for item in raw {
            self.ensure_running(stats)?;
            let result = self.store_product(tenant_id, item).await;
            tally(&mut stats, "product", tenant_id, item, result);
        }

        info!(
            created = stats.created,
            updated = stats.updated,
            errors = stats.errors,
            "Reconciled products"
        );
        Ok(stats)
    }

    pub(super) async fn store_product(
        &self,
        tenant_id: TenantId,
        raw: &Value,
    ) -> Result<Outcome, RecordError> {
        let record = decode_product(raw)?;

        let (product_id, outcome) = match self
            .store
            .find_product_id(tenant_id, &record.external_id)
            .await?
        {
            Some(id) => {
                self.store.update_product(id, &record).await?;
                (id, Outcome::Updated)
            }
            None => (
                self.store.insert_product(tenant_id, &record).await?,
                Outcome::Created,
            ),
        };

        for variant in &record.variants {
            self.store.upsert_variant(product_id, variant).await?;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::db::MemoryStore;
    use crate::shopify::conversions::DEFAULT_VARIANT_TITLE;

    use super::*;

    #[tokio::test]
    async fn test_variants_upsert_by_external_id() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let tenant = TenantId::generate();
        let reconciler = Reconciler::new(&store, &cancel);

        reconciler
            .store_products(
                tenant,
                &[json!({"id": 10, "title": "Tee", "variants": [
                    {"id": 101, "price": "10.00"},
                    {"id": 102, "price": "12.00"}
                ]})],
            )
            .await
            .expect("create");

        let stats = reconciler
            .store_products(
                tenant,
                &[json!({"id": 10, "title": "Tee v2", "variants": [
                    {"id": 101, "price": "11.00"}
                ]})],
            )
            .await
            .expect("update");
        assert_eq!(stats, ReconcileStats { created: 0, updated: 1, errors: 0 });

        let product = store.product(tenant, "10").await.expect("product");
        assert_eq!(product.title, "Tee v2");

        let variants = store.variants(product.id).await;
        assert_eq!(variants.len(), 2);
        let first = variants
            .iter()
            .find(|v| v.variant.external_id.as_str() == "101")
            .expect("variant 101");
        assert_eq!(first.variant.price, "11.00".parse::<Decimal>().expect("decimal"));
    }

    #[tokio::test]
    async fn test_product_without_variants_gets_default_variant() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let tenant = TenantId::generate();

        Reconciler::new(&store, &cancel)
            .store_products(tenant, &[json!({"id": 11, "title": "Gift card"})])
            .await
            .expect("batch");

        let product = store.product(tenant, "11").await.expect("product");
        let variants = store.variants(product.id).await;
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].variant.title, DEFAULT_VARIANT_TITLE);
    }

    #[tokio::test]
    async fn test_product_with_bad_variant_is_one_error() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let tenant = TenantId::generate();

        let stats = Reconciler::new(&store, &cancel)
            .store_products(
                tenant,
                &[
                    json!({"id": 1, "variants": [{"title": "no id"}]}),
                    json!({"id": 2}),
                ],
            )
            .await
            .expect("batch");

        assert_eq!(stats, ReconcileStats { created: 1, updated: 0, errors: 1 });
        assert!(store.product(tenant, "1").await.is_none());
    }
}
