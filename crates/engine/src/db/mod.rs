//! Persistence for synced store data.
//!
//! The reconciler and orchestrator never talk to a database directly; they
//! take an explicitly constructed [`SyncStore`] handle. Two implementations
//! ship with the engine:
//!
//! - [`PgSyncStore`] - `PostgreSQL` via sqlx (production)
//! - [`MemoryStore`] - in-process maps (tests, dry runs)
//!
//! ## Tables
//!
//! - `tenants` - one row per connected store domain
//! - `stores` - store metadata keyed by domain
//! - `customers` / `customer_addresses`
//! - `products` / `product_variants`
//! - `orders` / `order_line_items`
//! - `custom_events` - cart/checkout webhook events
//! - `sync_jobs` - audit trail of full syncs
//!
//! # Migrations
//!
//! Migrations are stored in `crates/engine/migrations/` and run via:
//! ```bash
//! cargo run -p shopsync-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use shopsync_core::{
    CustomEventId, CustomerId, ExternalId, OrderId, ProductId, SyncJobId, SyncJobType, TenantId,
    VariantId,
};

use crate::models::{
    AddressRecord, CustomerRecord, JobCompletion, NewCustomEvent, NewLineItem, NewTenant,
    OrderRecord, ProductRecord, StoreRecord, SyncJob, Tenant, VariantRecord,
};

pub use memory::MemoryStore;
pub use postgres::PgSyncStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate domain, job already terminal).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Repository interface consumed by the reconciler and orchestrator.
///
/// Every operation is scoped by an explicit tenant id or by an owning parent
/// id (product for variants, order for line items, customer for addresses).
#[async_trait]
pub trait SyncStore: Send + Sync {
    // -------------------------------------------------------------------------
    // Tenants
    // -------------------------------------------------------------------------

    /// Get a tenant by id.
    async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError>;

    /// Get the tenant owning a store domain.
    async fn find_tenant_by_domain(
        &self,
        shop_domain: &str,
    ) -> Result<Option<Tenant>, RepositoryError>;

    /// Create a tenant. Fails with `Conflict` if the id or domain is taken.
    async fn insert_tenant(&self, tenant: &NewTenant) -> Result<Tenant, RepositoryError>;

    /// Store a new access credential and mark the tenant active.
    async fn update_tenant_credential(
        &self,
        id: TenantId,
        access_token: &SecretString,
    ) -> Result<Tenant, RepositoryError>;

    /// Set or clear the tenant's own webhook signing secret.
    async fn set_tenant_webhook_secret(
        &self,
        id: TenantId,
        webhook_secret: Option<&SecretString>,
    ) -> Result<Tenant, RepositoryError>;

    /// Create or refresh the store record for a domain.
    async fn upsert_store(
        &self,
        tenant_id: TenantId,
        shop_domain: &str,
    ) -> Result<StoreRecord, RepositoryError>;

    // -------------------------------------------------------------------------
    // Customers
    // -------------------------------------------------------------------------

    /// Resolve a customer by (tenant, external id).
    async fn find_customer_id(
        &self,
        tenant_id: TenantId,
        external_id: &ExternalId,
    ) -> Result<Option<CustomerId>, RepositoryError>;

    /// Insert a customer that does not exist yet.
    async fn insert_customer(
        &self,
        tenant_id: TenantId,
        customer: &CustomerRecord,
    ) -> Result<CustomerId, RepositoryError>;

    /// Overwrite the mutable fields of an existing customer.
    async fn update_customer(
        &self,
        id: CustomerId,
        customer: &CustomerRecord,
    ) -> Result<(), RepositoryError>;

    /// Replace all addresses of a customer.
    async fn replace_customer_addresses(
        &self,
        customer_id: CustomerId,
        addresses: &[AddressRecord],
    ) -> Result<(), RepositoryError>;

    // -------------------------------------------------------------------------
    // Products
    // -------------------------------------------------------------------------

    /// Resolve a product by (tenant, external id).
    async fn find_product_id(
        &self,
        tenant_id: TenantId,
        external_id: &ExternalId,
    ) -> Result<Option<ProductId>, RepositoryError>;

    /// Insert a product that does not exist yet (variants are written separately).
    async fn insert_product(
        &self,
        tenant_id: TenantId,
        product: &ProductRecord,
    ) -> Result<ProductId, RepositoryError>;

    /// Overwrite the mutable fields of an existing product.
    async fn update_product(
        &self,
        id: ProductId,
        product: &ProductRecord,
    ) -> Result<(), RepositoryError>;

    /// Insert or overwrite a variant keyed by (product, external id).
    async fn upsert_variant(
        &self,
        product_id: ProductId,
        variant: &VariantRecord,
    ) -> Result<VariantId, RepositoryError>;

    /// Resolve a variant by (product, external id).
    async fn find_variant_id(
        &self,
        product_id: ProductId,
        external_id: &ExternalId,
    ) -> Result<Option<VariantId>, RepositoryError>;

    /// Resolve a variant by SKU among the tenant's products.
    async fn find_variant_by_sku(
        &self,
        tenant_id: TenantId,
        sku: &str,
    ) -> Result<Option<(ProductId, VariantId)>, RepositoryError>;

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// Resolve an order by (tenant, external id).
    async fn find_order_id(
        &self,
        tenant_id: TenantId,
        external_id: &ExternalId,
    ) -> Result<Option<OrderId>, RepositoryError>;

    /// Insert an order that does not exist yet (line items are written separately).
    async fn insert_order(
        &self,
        tenant_id: TenantId,
        customer_id: Option<CustomerId>,
        order: &OrderRecord,
    ) -> Result<OrderId, RepositoryError>;

    /// Overwrite the mutable fields of an existing order.
    async fn update_order(
        &self,
        id: OrderId,
        customer_id: Option<CustomerId>,
        order: &OrderRecord,
    ) -> Result<(), RepositoryError>;

    /// Delete every line item of an order and write `items` in their place.
    async fn replace_line_items(
        &self,
        order_id: OrderId,
        items: &[NewLineItem],
    ) -> Result<(), RepositoryError>;

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Record a behavioral event.
    async fn insert_custom_event(
        &self,
        event: &NewCustomEvent,
    ) -> Result<CustomEventId, RepositoryError>;

    // -------------------------------------------------------------------------
    // Sync jobs
    // -------------------------------------------------------------------------

    /// Create a job in `running` state.
    async fn create_sync_job(
        &self,
        tenant_id: TenantId,
        job_type: SyncJobType,
    ) -> Result<SyncJob, RepositoryError>;

    /// Move a running job to its terminal state.
    ///
    /// Fails with `NotFound` for an unknown job and `Conflict` if the job is
    /// already terminal.
    async fn finish_sync_job(
        &self,
        id: SyncJobId,
        completion: &JobCompletion,
    ) -> Result<SyncJob, RepositoryError>;

    /// Get a job by id.
    async fn get_sync_job(&self, id: SyncJobId) -> Result<Option<SyncJob>, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
