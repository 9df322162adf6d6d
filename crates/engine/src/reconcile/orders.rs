//! Order and line item reconciliation.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use shopsync_core::{ProductId, ReconcileStats, TenantId, VariantId};

use super::{Outcome, ReconcileCancelled, Reconciler, RecordError, tally};
use crate::models::{LineItemRecord, NewLineItem};
use crate::shopify::conversions::decode_order;

impl Reconciler<'_> {
    /// Upsert a batch of raw orders, replacing each order's line items.
    ///
    /// The customer link resolves by external customer id; a miss stores
    /// `None`. Line items link to a product/variant by external id, falling
    /// back to SKU; unresolved items are stored with `product_exists = false`.
    /// A line item repeating an earlier key in the same order is dropped.
    /// Customers should be reconciled before orders.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileCancelled` if the cancellation token fires.
    #[instrument(skip(self, raw), fields(tenant_id = %tenant_id, count = raw.len()))]
    pub async fn store_orders(
        &self,
        tenant_id: TenantId,
        raw: &[Value],
    ) -> Result<ReconcileStats, ReconcileCancelled> {
        let mut stats = ReconcileStats::default();

        for item in raw {
            self.ensure_running(stats)?;
            let result = self.store_order(tenant_id, item).await;
            tally(&mut stats, "order", tenant_id, item, result);
        }

        info!(
            created = stats.created,
            updated = stats.updated,
            errors = stats.errors,
            "Reconciled orders"
        );
        Ok(stats)
    }

    pub(super) async fn store_order(
        &self,
        tenant_id: TenantId,
        raw: &Value,
    ) -> Result<Outcome, RecordError> {
        let record = decode_order(raw)?;

        let customer_id = match &record.customer_external_id {
            Some(external_id) => self.store.find_customer_id(tenant_id, external_id).await?,
            None => None,
        };

        let mut seen = HashSet::with_capacity(record.line_items.len());
        let mut items = Vec::with_capacity(record.line_items.len());
        for item in &record.line_items {
            if !seen.insert(item.line_key.as_str()) {
                warn!(
                    external_id = %record.external_id,
                    line_key = %item.line_key,
                    "Skipping repeated line item"
                );
                continue;
            }
            items.push(self.resolve_line_item(tenant_id, item).await?);
        }

        let (order_id, outcome) = match self
            .store
            .find_order_id(tenant_id, &record.external_id)
            .await?
        {
            Some(id) => {
                self.store.update_order(id, customer_id, &record).await?;
                (id, Outcome::Updated)
            }
            None => (
                self.store
                    .insert_order(tenant_id, customer_id, &record)
                    .await?,
                Outcome::Created,
            ),
        };

        self.store.replace_line_items(order_id, &items).await?;
        Ok(outcome)
    }

    async fn resolve_line_item(
        &self,
        tenant_id: TenantId,
        item: &LineItemRecord,
    ) -> Result<NewLineItem, RecordError> {
        let mut product_id: Option<ProductId> = None;
        let mut variant_id: Option<VariantId> = None;

        if let Some(product_external_id) = &item.product_external_id {
            product_id = self
                .store
                .find_product_id(tenant_id, product_external_id)
                .await?;
            if let (Some(pid), Some(variant_external_id)) =
                (product_id, &item.variant_external_id)
            {
                variant_id = self.store.find_variant_id(pid, variant_external_id).await?;
            }
        }

        if product_id.is_none()
            && let Some(sku) = item.sku.as_deref().filter(|s| !s.trim().is_empty())
            && let Some((pid, vid)) = self.store.find_variant_by_sku(tenant_id, sku).await?
        {
            debug!(sku, line_key = %item.line_key, "Linked line item by SKU");
            product_id = Some(pid);
            variant_id = Some(vid);
        }

        Ok(NewLineItem {
            line_key: item.line_key.clone(),
            external_id: item.external_id.clone(),
            product_id,
            variant_id,
            title: item.title.clone(),
            quantity: item.quantity,
            price: item.price,
            total_discount: item.total_discount,
            sku: item.sku.clone(),
            vendor: item.vendor.clone(),
            product_exists: product_id.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::db::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_resync_replaces_line_items() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let tenant = TenantId::generate();
        let reconciler = Reconciler::new(&store, &cancel);

        reconciler
            .store_orders(
                tenant,
                &[json!({"id": 1, "line_items": [
                    {"id": 11, "title": "A"},
                    {"id": 12, "title": "B"},
                    {"id": 13, "title": "C"}
                ]})],
            )
            .await
            .expect("create");

        let stats = reconciler
            .store_orders(
                tenant,
                &[json!({"id": 1, "line_items": [{"id": 14, "title": "D"}]})],
            )
            .await
            .expect("update");
        assert_eq!(stats, ReconcileStats { created: 0, updated: 1, errors: 0 });

        let order = store.order(tenant, "1").await.expect("order");
        let items = store.line_items(order.id).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item.title, "D");
    }

    #[tokio::test]
    async fn test_unknown_product_is_flagged_not_error() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let tenant = TenantId::generate();

        let stats = Reconciler::new(&store, &cancel)
            .store_orders(
                tenant,
                &[json!({"id": 1, "customer": {"id": 404}, "line_items": [
                    {"id": 11, "product_id": 999, "variant_id": 9991, "title": "Ghost"}
                ]})],
            )
            .await
            .expect("batch");
        assert_eq!(stats.errors, 0);

        let order = store.order(tenant, "1").await.expect("order");
        assert_eq!(order.customer_id, None);
        let items = store.line_items(order.id).await;
        assert_eq!(items[0].item.product_id, None);
        assert_eq!(items[0].item.variant_id, None);
        assert!(!items[0].item.product_exists);
    }

    #[tokio::test]
    async fn test_line_items_link_by_id_then_sku() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let tenant = TenantId::generate();
        let reconciler = Reconciler::new(&store, &cancel);

        reconciler
            .store_customers(tenant, &[json!({"id": 900})])
            .await
            .expect("customers");
        reconciler
            .store_products(
                tenant,
                &[json!({"id": 10, "variants": [{"id": 101, "sku": "TEE-S"}]})],
            )
            .await
            .expect("products");

        reconciler
            .store_orders(
                tenant,
                &[json!({"id": 1, "customer": {"id": 900}, "line_items": [
                    {"id": 11, "product_id": 10, "variant_id": 101},
                    {"id": 12, "sku": "TEE-S"}
                ]})],
            )
            .await
            .expect("orders");

        let product = store.product(tenant, "10").await.expect("product");
        let customer = store.customer(tenant, "900").await.expect("customer");
        let order = store.order(tenant, "1").await.expect("order");
        assert_eq!(order.customer_id, Some(customer.id));

        let items = store.line_items(order.id).await;
        assert_eq!(items.len(), 2);
        for item in &items {
            assert_eq!(item.item.product_id, Some(product.id));
            assert!(item.item.variant_id.is_some());
            assert!(item.item.product_exists);
        }
    }

    #[tokio::test]
    async fn test_repeated_line_item_id_keeps_first() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let tenant = TenantId::generate();

        let stats = Reconciler::new(&store, &cancel)
            .store_orders(
                tenant,
                &[json!({"id": 1, "line_items": [
                    {"id": 11, "title": "A"},
                    {"id": 11, "title": "A again"},
                    {"id": 12, "title": "B"}
                ]})],
            )
            .await
            .expect("batch");
        assert_eq!(stats, ReconcileStats { created: 1, updated: 0, errors: 0 });

        let order = store.order(tenant, "1").await.expect("order");
        let titles: Vec<String> = store
            .line_items(order.id)
            .await
            .into_iter()
            .map(|li| li.item.title)
            .collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_line_items_without_ids_get_positional_keys() {
        let store = MemoryStore::new();
        let cancel = CancellationToken::new();
        let tenant = TenantId::generate();
        let reconciler = Reconciler::new(&store, &cancel);
        let raw = [json!({"id": 1, "line_items": [{"title": "A"}, {"title": "B"}]})];

        reconciler.store_orders(tenant, &raw).await.expect("first");
        reconciler.store_orders(tenant, &raw).await.expect("second");

        let order = store.order(tenant, "1").await.expect("order");
        let keys: Vec<String> = store
            .line_items(order.id)
            .await
            .into_iter()
            .map(|li| li.item.line_key)
            .collect();
        assert_eq!(keys, vec!["pos-0", "pos-1"]);
    }
}
