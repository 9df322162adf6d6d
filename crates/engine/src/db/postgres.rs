//! `PostgreSQL` implementation of [`SyncStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use shopsync_core::{
    CustomEventId, CustomerId, ExternalId, OrderId, ProductId, StoreId, SyncJobId, SyncJobStatus,
    SyncJobType, TenantId, VariantId,
};

use super::{RepositoryError, SyncStore};
use crate::models::{
    AddressRecord, CustomerRecord, JobCompletion, NewCustomEvent, NewLineItem, NewTenant,
    OrderRecord, ProductRecord, StoreRecord, SyncJob, Tenant, VariantRecord,
};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: TenantId,
    name: String,
    shop_domain: String,
    access_token: Option<String>,
    webhook_secret: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TenantRow> for Tenant {
    fn from(row: TenantRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            shop_domain: row.shop_domain,
            access_token: row.access_token.map(SecretString::from),
            webhook_secret: row.webhook_secret.map(SecretString::from),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    id: StoreId,
    tenant_id: TenantId,
    shop_domain: String,
    name: String,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StoreRow> for StoreRecord {
    fn from(row: StoreRow) -> Self {
        Self {
            id: row.id,
            tenant_id: row.tenant_id,
            shop_domain: row.shop_domain,
            name: row.name,
            currency: row.currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SyncJobRow {
    id: SyncJobId,
    tenant_id: TenantId,
    job_type: String,
    status: SyncJobStatus,
    processed_records: i64,
    error_count: i64,
    metadata: Option<String>,
    error: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SyncJobRow> for SyncJob {
    type Error = RepositoryError;

    fn try_from(row: SyncJobRow) -> Result<Self, Self::Error> {
        let job_type: SyncJobType = row
            .job_type
            .parse()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: row.id,
            tenant_id: row.tenant_id,
            job_type,
            status: row.status,
            processed_records: row.processed_records,
            error_count: row.error_count,
            metadata: row.metadata,
            error: row.error,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

const SYNC_JOB_COLUMNS: &str = "id, tenant_id, job_type, status, processed_records, \
     error_count, metadata, error, started_at, completed_at";

const TENANT_COLUMNS: &str =
    "id, name, shop_domain, access_token, webhook_secret, is_active, created_at, updated_at";

/// Map unique-constraint violations to `Conflict`.
fn conflict_on_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(what())
        }
        _ => RepositoryError::Database(err),
    }
}

// =============================================================================
// Store
// =============================================================================

/// [`SyncStore`] backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgSyncStore {
    pool: PgPool,
}

impl PgSyncStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SyncStore for PgSyncStore {
    async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Tenant::from))
    }

    async fn find_tenant_by_domain(
        &self,
        shop_domain: &str,
    ) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE shop_domain = $1"
        ))
        .bind(shop_domain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Tenant::from))
    }

    async fn insert_tenant(&self, tenant: &NewTenant) -> Result<Tenant, RepositoryError> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "INSERT INTO tenants (id, name, shop_domain, access_token) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {TENANT_COLUMNS}"
        ))
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.shop_domain)
        .bind(tenant.access_token.as_ref().map(ExposeSecret::expose_secret))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!("tenant for {} already exists", tenant.shop_domain)
            })
        })?;

        Ok(row.into())
    }

    async fn update_tenant_credential(
        &self,
        id: TenantId,
        access_token: &SecretString,
    ) -> Result<Tenant, RepositoryError> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "UPDATE tenants \
             SET access_token = $2, is_active = TRUE, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {TENANT_COLUMNS}"
        ))
        .bind(id)
        .bind(access_token.expose_secret())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn set_tenant_webhook_secret(
        &self,
        id: TenantId,
        webhook_secret: Option<&SecretString>,
    ) -> Result<Tenant, RepositoryError> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "UPDATE tenants \
             SET webhook_secret = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {TENANT_COLUMNS}"
        ))
        .bind(id)
        .bind(webhook_secret.map(ExposeSecret::expose_secret))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn upsert_store(
        &self,
        tenant_id: TenantId,
        shop_domain: &str,
    ) -> Result<StoreRecord, RepositoryError> {
        let row = sqlx::query_as::<_, StoreRow>(
            r"
            INSERT INTO stores (tenant_id, shop_domain, name)
            VALUES ($1, $2, 'Store ' || $2)
            ON CONFLICT (shop_domain) DO UPDATE SET
                tenant_id = EXCLUDED.tenant_id,
                updated_at = NOW()
            RETURNING id, tenant_id, shop_domain, name, currency, created_at, updated_at
            ",
        )
        .bind(tenant_id)
        .bind(shop_domain)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_customer_id(
        &self,
        tenant_id: TenantId,
        external_id: &ExternalId,
    ) -> Result<Option<CustomerId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, CustomerId>(
            "SELECT id FROM customers WHERE tenant_id = $1 AND external_id = $2",
        )
        .bind(tenant_id)
        .bind(external_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_customer(
        &self,
        tenant_id: TenantId,
        customer: &CustomerRecord,
    ) -> Result<CustomerId, RepositoryError> {
        sqlx::query_scalar::<_, CustomerId>(
            r"
            INSERT INTO customers (
                tenant_id, external_id, email, first_name, last_name, phone,
                accepts_marketing, total_spent, orders_count, state, tags, last_order_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            ",
        )
        .bind(tenant_id)
        .bind(customer.external_id.as_str())
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.phone)
        .bind(customer.accepts_marketing)
        .bind(customer.total_spent)
        .bind(customer.orders_count)
        .bind(&customer.state)
        .bind(&customer.tags)
        .bind(customer.last_order_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!("customer {} already exists", customer.external_id)
            })
        })
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        customer: &CustomerRecord,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE customers SET
                email = $2,
                first_name = $3,
                last_name = $4,
                phone = $5,
                accepts_marketing = $6,
                total_spent = $7,
                orders_count = $8,
                state = $9,
                tags = $10,
                last_order_at = $11,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.phone)
        .bind(customer.accepts_marketing)
        .bind(customer.total_spent)
        .bind(customer.orders_count)
        .bind(&customer.state)
        .bind(&customer.tags)
        .bind(customer.last_order_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn replace_customer_addresses(
        &self,
        customer_id: CustomerId,
        addresses: &[AddressRecord],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM customer_addresses WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&mut *tx)
            .await?;

        for address in addresses {
            sqlx::query(
                r"
                INSERT INTO customer_addresses (
                    customer_id, first_name, last_name, company, address1, address2,
                    city, province, country, zip, phone, is_default
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ",
            )
            .bind(customer_id)
            .bind(&address.first_name)
            .bind(&address.last_name)
            .bind(&address.company)
            .bind(&address.address1)
            .bind(&address.address2)
            .bind(&address.city)
            .bind(&address.province)
            .bind(&address.country)
            .bind(&address.zip)
            .bind(&address.phone)
            .bind(address.is_default)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_product_id(
        &self,
        tenant_id: TenantId,
        external_id: &ExternalId,
    ) -> Result<Option<ProductId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, ProductId>(
            "SELECT id FROM products WHERE tenant_id = $1 AND external_id = $2",
        )
        .bind(tenant_id)
        .bind(external_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_product(
        &self,
        tenant_id: TenantId,
        product: &ProductRecord,
    ) -> Result<ProductId, RepositoryError> {
        sqlx::query_scalar::<_, ProductId>(
            r"
            INSERT INTO products (
                tenant_id, external_id, title, handle, description, vendor,
                product_type, status, tags, images
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(tenant_id)
        .bind(product.external_id.as_str())
        .bind(&product.title)
        .bind(&product.handle)
        .bind(&product.description)
        .bind(&product.vendor)
        .bind(&product.product_type)
        .bind(&product.status)
        .bind(&product.tags)
        .bind(&product.images)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!("product {} already exists", product.external_id)
            })
        })
    }

    async fn update_product(
        &self,
        id: ProductId,
        product: &ProductRecord,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products SET
                title = $2,
                handle = $3,
                description = $4,
                vendor = $5,
                product_type = $6,
                status = $7,
                tags = $8,
                images = $9,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(&product.title)
        .bind(&product.handle)
        .bind(&product.description)
        .bind(&product.vendor)
        .bind(&product.product_type)
        .bind(&product.status)
        .bind(&product.tags)
        .bind(&product.images)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn upsert_variant(
        &self,
        product_id: ProductId,
        variant: &VariantRecord,
    ) -> Result<VariantId, RepositoryError> {
        let id = sqlx::query_scalar::<_, VariantId>(
            r"
            INSERT INTO product_variants (
                product_id, external_id, title, price, compare_at_price, sku, barcode,
                inventory_quantity, weight, weight_unit, requires_shipping, taxable, position
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (product_id, external_id) DO UPDATE SET
                title = EXCLUDED.title,
                price = EXCLUDED.price,
                compare_at_price = EXCLUDED.compare_at_price,
                sku = EXCLUDED.sku,
                barcode = EXCLUDED.barcode,
                inventory_quantity = EXCLUDED.inventory_quantity,
                weight = EXCLUDED.weight,
                weight_unit = EXCLUDED.weight_unit,
                requires_shipping = EXCLUDED.requires_shipping,
                taxable = EXCLUDED.taxable,
                position = EXCLUDED.position,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(variant.external_id.as_str())
        .bind(&variant.title)
        .bind(variant.price)
        .bind(variant.compare_at_price)
        .bind(&variant.sku)
        .bind(&variant.barcode)
        .bind(variant.inventory_quantity)
        .bind(variant.weight)
        .bind(&variant.weight_unit)
        .bind(variant.requires_shipping)
        .bind(variant.taxable)
        .bind(variant.position)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_variant_id(
        &self,
        product_id: ProductId,
        external_id: &ExternalId,
    ) -> Result<Option<VariantId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, VariantId>(
            "SELECT id FROM product_variants WHERE product_id = $1 AND external_id = $2",
        )
        .bind(product_id)
        .bind(external_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_variant_by_sku(
        &self,
        tenant_id: TenantId,
        sku: &str,
    ) -> Result<Option<(ProductId, VariantId)>, RepositoryError> {
        let ids = sqlx::query_as::<_, (ProductId, VariantId)>(
            r"
            SELECT v.product_id, v.id
            FROM product_variants v
            JOIN products p ON p.id = v.product_id
            WHERE p.tenant_id = $1 AND v.sku = $2
            ORDER BY v.id
            LIMIT 1
            ",
        )
        .bind(tenant_id)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn find_order_id(
        &self,
        tenant_id: TenantId,
        external_id: &ExternalId,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, OrderId>(
            "SELECT id FROM orders WHERE tenant_id = $1 AND external_id = $2",
        )
        .bind(tenant_id)
        .bind(external_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_order(
        &self,
        tenant_id: TenantId,
        customer_id: Option<CustomerId>,
        order: &OrderRecord,
    ) -> Result<OrderId, RepositoryError> {
        sqlx::query_scalar::<_, OrderId>(
            r"
            INSERT INTO orders (
                tenant_id, external_id, customer_id, order_number, email,
                total_price, subtotal_price, total_tax, total_discounts, currency,
                financial_status, fulfillment_status, tags, note,
                shipping_address, billing_address, processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING id
            ",
        )
        .bind(tenant_id)
        .bind(order.external_id.as_str())
        .bind(customer_id)
        .bind(&order.order_number)
        .bind(&order.email)
        .bind(order.total_price)
        .bind(order.subtotal_price)
        .bind(order.total_tax)
        .bind(order.total_discounts)
        .bind(&order.currency)
        .bind(&order.financial_status)
        .bind(&order.fulfillment_status)
        .bind(&order.tags)
        .bind(&order.note)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(order.processed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("order {} already exists", order.external_id)))
    }

    async fn update_order(
        &self,
        id: OrderId,
        customer_id: Option<CustomerId>,
        order: &OrderRecord,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE orders SET
                customer_id = $2,
                order_number = $3,
                email = $4,
                total_price = $5,
                subtotal_price = $6,
                total_tax = $7,
                total_discounts = $8,
                currency = $9,
                financial_status = $10,
                fulfillment_status = $11,
                tags = $12,
                note = $13,
                shipping_address = $14,
                billing_address = $15,
                processed_at = $16,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(customer_id)
        .bind(&order.order_number)
        .bind(&order.email)
        .bind(order.total_price)
        .bind(order.subtotal_price)
        .bind(order.total_tax)
        .bind(order.total_discounts)
        .bind(&order.currency)
        .bind(&order.financial_status)
        .bind(&order.fulfillment_status)
        .bind(&order.tags)
        .bind(&order.note)
        .bind(&order.shipping_address)
        .bind(&order.billing_address)
        .bind(order.processed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn replace_line_items(
        &self,
        order_id: OrderId,
        items: &[NewLineItem],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM order_line_items WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                r"
                INSERT INTO order_line_items (
                    order_id, line_key, external_id, product_id, variant_id, title,
                    quantity, price, total_discount, sku, vendor, product_exists
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ",
            )
            .bind(order_id)
            .bind(&item.line_key)
            .bind(item.external_id.as_ref().map(ExternalId::as_str))
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(&item.title)
            .bind(item.quantity)
            .bind(item.price)
            .bind(item.total_discount)
            .bind(&item.sku)
            .bind(&item.vendor)
            .bind(item.product_exists)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                conflict_on_unique(e, || format!("duplicate line item key {}", item.line_key))
            })?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_custom_event(
        &self,
        event: &NewCustomEvent,
    ) -> Result<CustomEventId, RepositoryError> {
        let id = sqlx::query_scalar::<_, CustomEventId>(
            r"
            INSERT INTO custom_events (tenant_id, customer_id, session_id, event_type, payload)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(event.tenant_id)
        .bind(event.customer_id)
        .bind(&event.session_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create_sync_job(
        &self,
        tenant_id: TenantId,
        job_type: SyncJobType,
    ) -> Result<SyncJob, RepositoryError> {
        let row = sqlx::query_as::<_, SyncJobRow>(&format!(
            "INSERT INTO sync_jobs (id, tenant_id, job_type, status) \
             VALUES ($1, $2, $3, 'running') \
             RETURNING {SYNC_JOB_COLUMNS}"
        ))
        .bind(SyncJobId::generate())
        .bind(tenant_id)
        .bind(job_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn finish_sync_job(
        &self,
        id: SyncJobId,
        completion: &JobCompletion,
    ) -> Result<SyncJob, RepositoryError> {
        let (processed, errors, metadata, error): (i64, i64, Option<&str>, Option<&str>) =
            match completion {
                JobCompletion::Completed {
                    processed_records,
                    error_count,
                    metadata,
                } => (*processed_records, *error_count, Some(metadata), None),
                JobCompletion::Failed { error } => (0, 0, None, Some(error)),
            };

        // Only a running job may move; the WHERE clause makes the transition atomic.
        let row = sqlx::query_as::<_, SyncJobRow>(&format!(
            "UPDATE sync_jobs SET \
                 status = $2, \
                 processed_records = $3, \
                 error_count = $4, \
                 metadata = $5, \
                 error = $6, \
                 completed_at = NOW() \
             WHERE id = $1 AND status = 'running' \
             RETURNING {SYNC_JOB_COLUMNS}"
        ))
        .bind(id)
        .bind(completion.status())
        .bind(processed)
        .bind(errors)
        .bind(metadata)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => match self.get_sync_job(id).await? {
                Some(job) => Err(RepositoryError::Conflict(format!(
                    "sync job {id} is already {}",
                    job.status
                ))),
                None => Err(RepositoryError::NotFound),
            },
        }
    }

    async fn get_sync_job(&self, id: SyncJobId) -> Result<Option<SyncJob>, RepositoryError> {
        let row = sqlx::query_as::<_, SyncJobRow>(&format!(
            "SELECT {SYNC_JOB_COLUMNS} FROM sync_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncJob::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_job_row_rejects_unknown_job_type() {
        let row = SyncJobRow {
            id: SyncJobId::generate(),
            tenant_id: TenantId::generate(),
            job_type: "partial".to_string(),
            status: SyncJobStatus::Running,
            processed_records: 0,
            error_count: 0,
            metadata: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        };

        let result = SyncJob::try_from(row);
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }

    #[test]
    fn test_tenant_row_wraps_credentials() {
        let row = TenantRow {
            id: TenantId::generate(),
            name: "Store demo.myshopify.com".to_string(),
            shop_domain: "demo.myshopify.com".to_string(),
            access_token: Some("shpat_abc".to_string()),
            webhook_secret: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let tenant = Tenant::from(row);
        assert_eq!(
            tenant.access_token.as_ref().map(ExposeSecret::expose_secret),
            Some("shpat_abc")
        );
        assert!(!format!("{tenant:?}").contains("shpat_abc"));
    }
}
