//! Full-sync orchestration.
//!
//! A full sync runs three phases strictly in order: customers, products,
//! orders (orders resolve customer links, so they come last). Each phase
//! fetches every page for its entity type and then reconciles the records one
//! at a time. Exactly one [`SyncJob`](crate::models::SyncJob) row is written
//! per run; it starts `running` and ends `completed` or `failed`, including on
//! cancellation and deadline expiry.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, instrument, warn};

use shopsync_core::{ReconcileStats, SyncBreakdown, SyncJobId, SyncJobType, TenantId};

use crate::config::SyncConfig;
use crate::db::{RepositoryError, SyncStore};
use crate::error::{SyncError, add_sync_breadcrumb, set_sentry_sync_context};
use crate::models::JobCompletion;
use crate::reconcile::{ReconcileCancelled, Reconciler};
use crate::shopify::{ShopifyClient, ShopifyClientConfig, ShopifyError, normalize_store_domain};

/// Result of a completed full sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSyncSummary {
    pub customers_processed: u32,
    pub products_processed: u32,
    pub orders_processed: u32,
    pub error_count: u32,
    pub sync_job_id: SyncJobId,
}

impl FullSyncSummary {
    fn new(sync_job_id: SyncJobId, breakdown: &SyncBreakdown) -> Self {
        Self {
            customers_processed: breakdown.customers.processed(),
            products_processed: breakdown.products.processed(),
            orders_processed: breakdown.orders.processed(),
            error_count: breakdown.errors(),
            sync_job_id,
        }
    }
}

// =============================================================================
// Per-tenant exclusion
// =============================================================================

/// Tenants with a full sync in flight in this process.
#[derive(Debug, Default)]
struct RunningTenants {
    tenants: Mutex<HashSet<TenantId>>,
}

impl RunningTenants {
    /// Claim `tenant_id`, or `None` if a sync already holds it.
    fn acquire(self: &Arc<Self>, tenant_id: TenantId) -> Option<TenantSyncGuard> {
        let mut tenants = self
            .tenants
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tenants.insert(tenant_id).then(|| TenantSyncGuard {
            registry: Arc::clone(self),
            tenant_id,
        })
    }

    fn is_running(&self, tenant_id: TenantId) -> bool {
        self.tenants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&tenant_id)
    }
}

/// Releases the tenant claim on drop.
#[derive(Debug)]
struct TenantSyncGuard {
    registry: Arc<RunningTenants>,
    tenant_id: TenantId,
}

impl Drop for TenantSyncGuard {
    fn drop(&mut self) {
        self.registry
            .tenants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.tenant_id);
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives full syncs against a [`SyncStore`].
///
/// Cheap to clone; clones share the per-tenant registry, so a second start
/// for a tenant is rejected no matter which clone it goes through.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    store: Arc<dyn SyncStore>,
    client_config: ShopifyClientConfig,
    sync_config: SyncConfig,
    running: Arc<RunningTenants>,
}

/// A validated run holding its job row and tenant claim.
struct PreparedRun {
    tenant_id: TenantId,
    job_id: SyncJobId,
    client: ShopifyClient,
    _guard: TenantSyncGuard,
}

impl SyncOrchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        store: Arc<dyn SyncStore>,
        client_config: ShopifyClientConfig,
        sync_config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                store,
                client_config,
                sync_config,
                running: Arc::new(RunningTenants::default()),
            }),
        }
    }

    /// Whether a full sync for `tenant_id` is running in this process.
    #[must_use]
    pub fn is_running(&self, tenant_id: TenantId) -> bool {
        self.inner.running.is_running(tenant_id)
    }

    /// Run a full sync and wait for it to finish.
    ///
    /// # Errors
    ///
    /// - `Validation` if the domain or credential is missing, or the domain is
    ///   not the tenant's connected store (no job is created)
    /// - `TenantNotFound` if the tenant does not exist
    /// - `SyncInProgress` if a sync for the tenant is already running
    /// - the failure class that ended the run; the job is then `failed`
    #[instrument(skip(self, access_token, cancel), fields(tenant_id = %tenant_id))]
    pub async fn perform_full_sync(
        &self,
        tenant_id: TenantId,
        store_domain: &str,
        access_token: SecretString,
        cancel: CancellationToken,
    ) -> Result<FullSyncSummary, SyncError> {
        let run = self.prepare(tenant_id, store_domain, access_token).await?;
        self.execute(run, cancel).await
    }

    /// Start a full sync in the background.
    ///
    /// Returns as soon as the job row exists, so the caller can poll the job
    /// by id. Cancelling `cancel` aborts the run and marks the job `failed`.
    ///
    /// # Errors
    ///
    /// Same validation errors as [`perform_full_sync`](Self::perform_full_sync);
    /// run failures are reported through the join handle.
    pub async fn start_full_sync(
        &self,
        tenant_id: TenantId,
        store_domain: &str,
        access_token: SecretString,
        cancel: CancellationToken,
    ) -> Result<(SyncJobId, JoinHandle<Result<FullSyncSummary, SyncError>>), SyncError> {
        let run = self.prepare(tenant_id, store_domain, access_token).await?;
        let job_id = run.job_id;
        let orchestrator = self.clone();
        let span = info_span!("full_sync", tenant_id = %tenant_id, job_id = %job_id);

        let handle = tokio::spawn(async move { orchestrator.execute(run, cancel).await }.instrument(span));
        Ok((job_id, handle))
    }

    async fn prepare(
        &self,
        tenant_id: TenantId,
        store_domain: &str,
        access_token: SecretString,
    ) -> Result<PreparedRun, SyncError> {
        let shop_domain = normalize_store_domain(store_domain)?;
        if access_token.expose_secret().trim().is_empty() {
            return Err(SyncError::Validation("access token is required".to_string()));
        }
        let client = ShopifyClient::new(&shop_domain, access_token, &self.inner.client_config)?;

        let tenant = self
            .inner
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| SyncError::TenantNotFound(tenant_id.to_string()))?;
        if tenant.shop_domain != shop_domain {
            return Err(SyncError::Validation(format!(
                "store {shop_domain} is not connected to tenant {tenant_id}"
            )));
        }

        let guard = self
            .inner
            .running
            .acquire(tenant_id)
            .ok_or(SyncError::SyncInProgress(tenant_id))?;

        let job = self
            .inner
            .store
            .create_sync_job(tenant_id, SyncJobType::FullSync)
            .await?;
        info!(job_id = %job.id, shop_domain = %shop_domain, "Sync job started");

        Ok(PreparedRun {
            tenant_id,
            job_id: job.id,
            client,
            _guard: guard,
        })
    }

    async fn execute(
        &self,
        run: PreparedRun,
        cancel: CancellationToken,
    ) -> Result<FullSyncSummary, SyncError> {
        let PreparedRun {
            tenant_id,
            job_id,
            client,
            _guard,
        } = run;
        set_sentry_sync_context(tenant_id, Some(job_id));

        let run_token = cancel.child_token();
        let deadline = self.inner.sync_config.job_timeout.map(|limit| {
            let token = run_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                token.cancel();
            })
        });

        let result = self.run_phases(tenant_id, &client, &run_token).await;
        if let Some(timer) = deadline {
            timer.abort();
        }

        let outcome = result
            .map_err(|err| self.explain_cancellation(err, &cancel))
            .and_then(|breakdown| {
                JobCompletion::completed(&breakdown)
                    .map(|completion| (breakdown, completion))
                    .map_err(|e| {
                        SyncError::Repository(RepositoryError::DataCorruption(format!(
                            "unserializable sync breakdown: {e}"
                        )))
                    })
            });

        match outcome {
            Ok((breakdown, completion)) => {
                self.inner.store.finish_sync_job(job_id, &completion).await?;
                info!(
                    job_id = %job_id,
                    processed = breakdown.processed(),
                    errors = breakdown.errors(),
                    "Sync job completed"
                );
                Ok(FullSyncSummary::new(job_id, &breakdown))
            }
            Err(err) => {
                let completion = JobCompletion::Failed {
                    error: err.to_string(),
                };
                if let Err(e) = self.inner.store.finish_sync_job(job_id, &completion).await {
                    error!(job_id = %job_id, error = %e, "Failed to mark sync job failed");
                }
                warn!(job_id = %job_id, error = %err, "Sync job failed");
                Err(err)
            }
        }
    }

    async fn run_phases(
        &self,
        tenant_id: TenantId,
        client: &ShopifyClient,
        cancel: &CancellationToken,
    ) -> Result<SyncBreakdown, SyncError> {
        let reconciler =
            Reconciler::new(self.inner.store.as_ref(), cancel).with_address_source(client);
        let mut breakdown = SyncBreakdown::default();

        let customers = self
            .fetch_phase("customers", cancel, || client.fetch_customers(None, cancel))
            .await?;
        breakdown.customers = reconciler
            .store_customers(tenant_id, &customers)
            .await
            .map_err(|e| phase_cancelled("customers", &e))?;
        phase_breadcrumb("customers", breakdown.customers);

        let products = self
            .fetch_phase("products", cancel, || client.fetch_products(None, cancel))
            .await?;
        breakdown.products = reconciler
            .store_products(tenant_id, &products)
            .await
            .map_err(|e| phase_cancelled("products", &e))?;
        phase_breadcrumb("products", breakdown.products);

        let status = self.inner.sync_config.order_status.as_str();
        let orders = self
            .fetch_phase("orders", cancel, || client.fetch_orders(None, status, cancel))
            .await?;
        breakdown.orders = reconciler
            .store_orders(tenant_id, &orders)
            .await
            .map_err(|e| phase_cancelled("orders", &e))?;
        phase_breadcrumb("orders", breakdown.orders);

        Ok(breakdown)
    }

    /// Run one paginated fetch, retrying rate-limit and availability failures.
    async fn fetch_phase<F, Fut>(
        &self,
        phase: &'static str,
        cancel: &CancellationToken,
        mut fetch: F,
    ) -> Result<Vec<Value>, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Vec<Value>, ShopifyError>>,
    {
        let config = &self.inner.sync_config;
        let mut attempt = 1;

        loop {
            match fetch().await {
                Ok(records) => {
                    info!(phase, count = records.len(), attempt, "Fetched records");
                    return Ok(records);
                }
                Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                    let mut delay = config.retry_delay(attempt);
                    if let ShopifyError::RateLimited { retry_after } = &e {
                        delay = delay.max(*retry_after);
                    }
                    warn!(
                        phase,
                        attempt,
                        max_attempts = config.max_attempts,
                        delay_ms = millis(delay),
                        error = %e,
                        "Fetch failed, retrying"
                    );

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return Err(SyncError::Cancelled(format!(
                                "cancelled while waiting to retry {phase}"
                            )));
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Distinguish caller cancellation from the job deadline.
    fn explain_cancellation(&self, err: SyncError, caller: &CancellationToken) -> SyncError {
        match (err, self.inner.sync_config.job_timeout) {
            (SyncError::Cancelled(reason), Some(limit)) if !caller.is_cancelled() => {
                SyncError::Cancelled(format!(
                    "exceeded the {}s job deadline ({reason})",
                    limit.as_secs_f64()
                ))
            }
            (err, _) => err,
        }
    }
}

fn phase_cancelled(phase: &str, cancelled: &ReconcileCancelled) -> SyncError {
    SyncError::Cancelled(format!(
        "cancelled during {phase} after {} records",
        cancelled.stats.total()
    ))
}

fn phase_breadcrumb(phase: &str, stats: ReconcileStats) {
    add_sync_breadcrumb(
        &format!("Reconciled {phase}"),
        &[
            ("created", stats.created.to_string()),
            ("updated", stats.updated.to_string()),
            ("errors", stats.errors.to_string()),
        ],
    );
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
