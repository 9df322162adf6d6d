//! In-memory [`SyncStore`] used by tests and dry runs.
//!
//! Enforces the same uniqueness rules as the Postgres schema. All state sits
//! behind one async mutex, so every operation is atomic with respect to the
//! others.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use tokio::sync::Mutex;

use shopsync_core::{
    AddressId, CustomEventId, CustomerId, ExternalId, LineItemId, OrderId, ProductId, StoreId,
    SyncJobId, SyncJobStatus, SyncJobType, TenantId, VariantId,
};

use super::{RepositoryError, SyncStore};
use crate::models::{
    AddressRecord, CustomEvent, Customer, CustomerAddress, CustomerRecord, JobCompletion,
    LineItem, NewCustomEvent, NewLineItem, NewTenant, Order, OrderRecord, Product, ProductRecord,
    StoreRecord, SyncJob, Tenant, Variant, VariantRecord,
};

const DEFAULT_STORE_CURRENCY: &str = "USD";

#[derive(Default)]
struct Inner {
    next_id: i32,
    tenants: HashMap<TenantId, Tenant>,
    stores: HashMap<String, StoreRecord>,
    customers: BTreeMap<CustomerId, Customer>,
    addresses: BTreeMap<AddressId, CustomerAddress>,
    products: BTreeMap<ProductId, Product>,
    variants: BTreeMap<VariantId, Variant>,
    orders: BTreeMap<OrderId, Order>,
    line_items: BTreeMap<LineItemId, LineItem>,
    events: Vec<CustomEvent>,
    jobs: HashMap<SyncJobId, SyncJob>,
}

impl Inner {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}

/// [`SyncStore`] backed by in-process maps.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make entity writes fail as if the database were unreachable.
    ///
    /// Reads, tenant and sync job operations keep working.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn ensure_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    /// All customers of a tenant, in insertion order.
    pub async fn customers(&self, tenant_id: TenantId) -> Vec<Customer> {
        let inner = self.inner.lock().await;
        inner
            .customers
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// A customer by (tenant, external id).
    pub async fn customer(&self, tenant_id: TenantId, external_id: &str) -> Option<Customer> {
        let inner = self.inner.lock().await;
        inner
            .customers
            .values()
            .find(|c| c.tenant_id == tenant_id && c.external_id.as_str() == external_id)
            .cloned()
    }

    /// Addresses of a customer.
    pub async fn addresses(&self, customer_id: CustomerId) -> Vec<AddressRecord> {
        let inner = self.inner.lock().await;
        inner
            .addresses
            .values()
            .filter(|a| a.customer_id == customer_id)
            .map(|a| a.address.clone())
            .collect()
    }

    /// All products of a tenant.
    pub async fn products(&self, tenant_id: TenantId) -> Vec<Product> {
        let inner = self.inner.lock().await;
        inner
            .products
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// A product by (tenant, external id).
    pub async fn product(&self, tenant_id: TenantId, external_id: &str) -> Option<Product> {
        let inner = self.inner.lock().await;
        inner
            .products
            .values()
            .find(|p| p.tenant_id == tenant_id && p.external_id.as_str() == external_id)
            .cloned()
    }

    /// Variants of a product.
    pub async fn variants(&self, product_id: ProductId) -> Vec<Variant> {
        let inner = self.inner.lock().await;
        inner
            .variants
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect()
    }

    /// All orders of a tenant.
    pub async fn orders(&self, tenant_id: TenantId) -> Vec<Order> {
        let inner = self.inner.lock().await;
        inner
            .orders
            .values()
            .filter(|o| o.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// An order by (tenant, external id).
    pub async fn order(&self, tenant_id: TenantId, external_id: &str) -> Option<Order> {
        let inner = self.inner.lock().await;
        inner
            .orders
            .values()
            .find(|o| o.tenant_id == tenant_id && o.external_id.as_str() == external_id)
            .cloned()
    }

    /// Line items of an order.
    pub async fn line_items(&self, order_id: OrderId) -> Vec<LineItem> {
        let inner = self.inner.lock().await;
        inner
            .line_items
            .values()
            .filter(|li| li.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Events recorded for a tenant.
    pub async fn events(&self, tenant_id: TenantId) -> Vec<CustomEvent> {
        let inner = self.inner.lock().await;
        inner
            .events
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Sync jobs of a tenant, oldest first.
    pub async fn sync_jobs(&self, tenant_id: TenantId) -> Vec<SyncJob> {
        let inner = self.inner.lock().await;
        let mut jobs: Vec<SyncJob> = inner
            .jobs
            .values()
            .filter(|j| j.tenant_id == tenant_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }

    /// Store record for a domain.
    pub async fn store_record(&self, shop_domain: &str) -> Option<StoreRecord> {
        self.inner.lock().await.stores.get(shop_domain).cloned()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>, RepositoryError> {
        Ok(self.inner.lock().await.tenants.get(&id).cloned())
    }

    async fn find_tenant_by_domain(
        &self,
        shop_domain: &str,
    ) -> Result<Option<Tenant>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tenants
            .values()
            .find(|t| t.shop_domain == shop_domain)
            .cloned())
    }

    async fn insert_tenant(&self, tenant: &NewTenant) -> Result<Tenant, RepositoryError> {
        let mut inner = self.inner.lock().await;
        if inner.tenants.contains_key(&tenant.id) {
            return Err(RepositoryError::Conflict(format!(
                "tenant {} already exists",
                tenant.id
            )));
        }
        if inner
            .tenants
            .values()
            .any(|t| t.shop_domain == tenant.shop_domain)
        {
            return Err(RepositoryError::Conflict(format!(
                "domain {} already linked",
                tenant.shop_domain
            )));
        }

        let now = Utc::now();
        let row = Tenant {
            id: tenant.id,
            name: tenant.name.clone(),
            shop_domain: tenant.shop_domain.clone(),
            access_token: tenant.access_token.clone(),
            webhook_secret: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.tenants.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_tenant_credential(
        &self,
        id: TenantId,
        access_token: &SecretString,
    ) -> Result<Tenant, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let tenant = inner
            .tenants
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        tenant.access_token = Some(access_token.clone());
        tenant.is_active = true;
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }

    async fn set_tenant_webhook_secret(
        &self,
        id: TenantId,
        webhook_secret: Option<&SecretString>,
    ) -> Result<Tenant, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let tenant = inner
            .tenants
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        tenant.webhook_secret = webhook_secret.cloned();
        tenant.updated_at = Utc::now();
        Ok(tenant.clone())
    }

    async fn upsert_store(
        &self,
        tenant_id: TenantId,
        shop_domain: &str,
    ) -> Result<StoreRecord, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        if let Some(store) = inner.stores.get_mut(shop_domain) {
            store.tenant_id = tenant_id;
            store.updated_at = now;
            return Ok(store.clone());
        }

        let store = StoreRecord {
            id: StoreId::new(inner.next_id()),
            tenant_id,
            shop_domain: shop_domain.to_string(),
            name: format!("Store {shop_domain}"),
            currency: DEFAULT_STORE_CURRENCY.to_string(),
            created_at: now,
            updated_at: now,
        };
        inner.stores.insert(shop_domain.to_string(), store.clone());
        Ok(store)
    }

    async fn find_customer_id(
        &self,
        tenant_id: TenantId,
        external_id: &ExternalId,
    ) -> Result<Option<CustomerId>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .customers
            .values()
            .find(|c| c.tenant_id == tenant_id && &c.external_id == external_id)
            .map(|c| c.id))
    }

    async fn insert_customer(
        &self,
        tenant_id: TenantId,
        customer: &CustomerRecord,
    ) -> Result<CustomerId, RepositoryError> {
        self.ensure_writable()?;
        let mut inner = self.inner.lock().await;
        if inner
            .customers
            .values()
            .any(|c| c.tenant_id == tenant_id && c.external_id == customer.external_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "customer {} already exists",
                customer.external_id
            )));
        }

        let id = CustomerId::new(inner.next_id());
        let now = Utc::now();
        inner.customers.insert(
            id,
            Customer {
                id,
                tenant_id,
                external_id: customer.external_id.clone(),
                email: customer.email.clone(),
                first_name: customer.first_name.clone(),
                last_name: customer.last_name.clone(),
                phone: customer.phone.clone(),
                accepts_marketing: customer.accepts_marketing,
                total_spent: customer.total_spent,
                orders_count: customer.orders_count,
                state: customer.state.clone(),
                tags: customer.tags.clone(),
                last_order_at: customer.last_order_at,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        customer: &CustomerRecord,
    ) -> Result<(), RepositoryError> {
        self.ensure_writable()?;
        let mut inner = self.inner.lock().await;
        let row = inner
            .customers
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        row.email.clone_from(&customer.email);
        row.first_name.clone_from(&customer.first_name);
        row.last_name.clone_from(&customer.last_name);
        row.phone.clone_from(&customer.phone);
        row.accepts_marketing = customer.accepts_marketing;
        row.total_spent = customer.total_spent;
        row.orders_count = customer.orders_count;
        row.state.clone_from(&customer.state);
        row.tags.clone_from(&customer.tags);
        row.last_order_at = customer.last_order_at;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn replace_customer_addresses(
        &self,
        customer_id: CustomerId,
        addresses: &[AddressRecord],
    ) -> Result<(), RepositoryError> {
        self.ensure_writable()?;
        let mut inner = self.inner.lock().await;
        if !inner.customers.contains_key(&customer_id) {
            return Err(RepositoryError::NotFound);
        }
        inner.addresses.retain(|_, a| a.customer_id != customer_id);
        for address in addresses {
            let id = AddressId::new(inner.next_id());
            inner.addresses.insert(
                id,
                CustomerAddress {
                    id,
                    customer_id,
                    address: address.clone(),
                },
            );
        }
        Ok(())
    }

    async fn find_product_id(
        &self,
        tenant_id: TenantId,
        external_id: &ExternalId,
    ) -> Result<Option<ProductId>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .products
            .values()
            .find(|p| p.tenant_id == tenant_id && &p.external_id == external_id)
            .map(|p| p.id))
    }

    async fn insert_product(
        &self,
        tenant_id: TenantId,
        product: &ProductRecord,
    ) -> Result<ProductId, RepositoryError> {
        self.ensure_writable()?;
        let mut inner = self.inner.lock().await;
        if inner
            .products
            .values()
            .any(|p| p.tenant_id == tenant_id && p.external_id == product.external_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "product {} already exists",
                product.external_id
            )));
        }

        let id = ProductId::new(inner.next_id());
        let now = Utc::now();
        inner.products.insert(
            id,
            Product {
                id,
                tenant_id,
                external_id: product.external_id.clone(),
                title: product.title.clone(),
                handle: product.handle.clone(),
                description: product.description.clone(),
                vendor: product.vendor.clone(),
                product_type: product.product_type.clone(),
                status: product.status.clone(),
                tags: product.tags.clone(),
                images: product.images.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_product(
        &self,
        id: ProductId,
        product: &ProductRecord,
    ) -> Result<(), RepositoryError> {
        self.ensure_writable()?;
        let mut inner = self.inner.lock().await;
        let row = inner
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        row.title.clone_from(&product.title);
        row.handle.clone_from(&product.handle);
        row.description.clone_from(&product.description);
        row.vendor.clone_from(&product.vendor);
        row.product_type.clone_from(&product.product_type);
        row.status.clone_from(&product.status);
        row.tags.clone_from(&product.tags);
        row.images.clone_from(&product.images);
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_variant(
        &self,
        product_id: ProductId,
        variant: &VariantRecord,
    ) -> Result<VariantId, RepositoryError> {
        self.ensure_writable()?;
        let mut inner = self.inner.lock().await;
        if !inner.products.contains_key(&product_id) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(existing) = inner
            .variants
            .values_mut()
            .find(|v| v.product_id == product_id && v.variant.external_id == variant.external_id)
        {
            existing.variant = variant.clone();
            return Ok(existing.id);
        }

        let id = VariantId::new(inner.next_id());
        inner.variants.insert(
            id,
            Variant {
                id,
                product_id,
                variant: variant.clone(),
            },
        );
        Ok(id)
    }

    async fn find_variant_id(
        &self,
        product_id: ProductId,
        external_id: &ExternalId,
    ) -> Result<Option<VariantId>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .variants
            .values()
            .find(|v| v.product_id == product_id && &v.variant.external_id == external_id)
            .map(|v| v.id))
    }

    async fn find_variant_by_sku(
        &self,
        tenant_id: TenantId,
        sku: &str,
    ) -> Result<Option<(ProductId, VariantId)>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .variants
            .values()
            .filter(|v| v.variant.sku.as_deref() == Some(sku))
            .find(|v| {
                inner
                    .products
                    .get(&v.product_id)
                    .is_some_and(|p| p.tenant_id == tenant_id)
            })
            .map(|v| (v.product_id, v.id)))
    }

    async fn find_order_id(
        &self,
        tenant_id: TenantId,
        external_id: &ExternalId,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .values()
            .find(|o| o.tenant_id == tenant_id && &o.external_id == external_id)
            .map(|o| o.id))
    }

    async fn insert_order(
        &self,
        tenant_id: TenantId,
        customer_id: Option<CustomerId>,
        order: &OrderRecord,
    ) -> Result<OrderId, RepositoryError> {
        self.ensure_writable()?;
        let mut inner = self.inner.lock().await;
        if inner
            .orders
            .values()
            .any(|o| o.tenant_id == tenant_id && o.external_id == order.external_id)
        {
            return Err(RepositoryError::Conflict(format!(
                "order {} already exists",
                order.external_id
            )));
        }

        let id = OrderId::new(inner.next_id());
        let now = Utc::now();
        inner.orders.insert(
            id,
            Order {
                id,
                tenant_id,
                external_id: order.external_id.clone(),
                customer_id,
                order_number: order.order_number.clone(),
                email: order.email.clone(),
                total_price: order.total_price,
                subtotal_price: order.subtotal_price,
                total_tax: order.total_tax,
                total_discounts: order.total_discounts,
                currency: order.currency.clone(),
                financial_status: order.financial_status.clone(),
                fulfillment_status: order.fulfillment_status.clone(),
                tags: order.tags.clone(),
                note: order.note.clone(),
                shipping_address: order.shipping_address.clone(),
                billing_address: order.billing_address.clone(),
                processed_at: order.processed_at,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_order(
        &self,
        id: OrderId,
        customer_id: Option<CustomerId>,
        order: &OrderRecord,
    ) -> Result<(), RepositoryError> {
        self.ensure_writable()?;
        let mut inner = self.inner.lock().await;
        let row = inner.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        row.customer_id = customer_id;
        row.order_number.clone_from(&order.order_number);
        row.email.clone_from(&order.email);
        row.total_price = order.total_price;
        row.subtotal_price = order.subtotal_price;
        row.total_tax = order.total_tax;
        row.total_discounts = order.total_discounts;
        row.currency.clone_from(&order.currency);
        row.financial_status.clone_from(&order.financial_status);
        row.fulfillment_status.clone_from(&order.fulfillment_status);
        row.tags.clone_from(&order.tags);
        row.note.clone_from(&order.note);
        row.shipping_address.clone_from(&order.shipping_address);
        row.billing_address.clone_from(&order.billing_address);
        row.processed_at = order.processed_at;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn replace_line_items(
        &self,
        order_id: OrderId,
        items: &[NewLineItem],
    ) -> Result<(), RepositoryError> {
        self.ensure_writable()?;
        let mut inner = self.inner.lock().await;
        if !inner.orders.contains_key(&order_id) {
            return Err(RepositoryError::NotFound);
        }

        let mut keys = std::collections::HashSet::new();
        if let Some(dup) = items.iter().find(|i| !keys.insert(i.line_key.as_str())) {
            return Err(RepositoryError::Conflict(format!(
                "duplicate line item key {}",
                dup.line_key
            )));
        }

        inner.line_items.retain(|_, li| li.order_id != order_id);
        for item in items {
            let id = LineItemId::new(inner.next_id());
            inner.line_items.insert(
                id,
                LineItem {
                    id,
                    order_id,
                    item: item.clone(),
                },
            );
        }
        Ok(())
    }

    async fn insert_custom_event(
        &self,
        event: &NewCustomEvent,
    ) -> Result<CustomEventId, RepositoryError> {
        self.ensure_writable()?;
        let mut inner = self.inner.lock().await;
        let id = CustomEventId::new(inner.next_id());
        inner.events.push(CustomEvent {
            id,
            tenant_id: event.tenant_id,
            customer_id: event.customer_id,
            session_id: event.session_id.clone(),
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            occurred_at: Utc::now(),
        });
        Ok(id)
    }

    async fn create_sync_job(
        &self,
        tenant_id: TenantId,
        job_type: SyncJobType,
    ) -> Result<SyncJob, RepositoryError> {
        let job = SyncJob {
            id: SyncJobId::generate(),
            tenant_id,
            job_type,
            status: SyncJobStatus::Running,
            processed_records: 0,
            error_count: 0,
            metadata: None,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        };
        self.inner.lock().await.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn finish_sync_job(
        &self,
        id: SyncJobId,
        completion: &JobCompletion,
    ) -> Result<SyncJob, RepositoryError> {
        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if !job.status.can_transition_to(completion.status()) {
            return Err(RepositoryError::Conflict(format!(
                "sync job {id} is already {}",
                job.status
            )));
        }

        match completion {
            JobCompletion::Completed {
                processed_records,
                error_count,
                metadata,
            } => {
                job.processed_records = *processed_records;
                job.error_count = *error_count;
                job.metadata = Some(metadata.clone());
            }
            JobCompletion::Failed { error } => {
                job.error = Some(error.clone());
            }
        }
        job.status = completion.status();
        job.completed_at = Some(Utc::now());
        Ok(job.clone())
    }

    async fn get_sync_job(&self, id: SyncJobId) -> Result<Option<SyncJob>, RepositoryError> {
        Ok(self.inner.lock().await.jobs.get(&id).cloned())
    }
}
