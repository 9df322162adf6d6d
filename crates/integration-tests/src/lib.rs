//! Shared fixtures for shopsync end-to-end tests.
//!
//! Each [`TestContext`] owns a `wiremock` server standing in for the store's
//! Admin API, an in-memory repository and one onboarded tenant. Tests drive
//! the real client, reconciler, orchestrator and router against them.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopsync-integration-tests
//! ```

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use serde_json::Value;
use sha2::Sha256;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shopsync_core::TenantId;
use shopsync_engine::config::{ShopifyConfig, SyncConfig};
use shopsync_engine::db::MemoryStore;
use shopsync_engine::error::SyncError;
use shopsync_engine::services::{FullSyncSummary, SyncOrchestrator, onboard_tenant};
use shopsync_engine::shopify::ShopifyClientConfig;
use shopsync_engine::state::AppState;

/// Store domain every fixture tenant is connected to.
pub const SHOP_DOMAIN: &str = "demo.myshopify.com";
/// Access token the mock upstream accepts.
pub const ACCESS_TOKEN: &str = "shpat_integration";
/// App-level webhook signing secret.
pub const WEBHOOK_SECRET: &str = "wh_7Hq2pX9vLm4Rt8Kd1Zs6Nb3Yc5Fg0Jw";

/// Mock upstream plus an onboarded tenant.
pub struct TestContext {
    pub server: MockServer,
    pub store: Arc<MemoryStore>,
    pub tenant_id: TenantId,
    pub sync_config: SyncConfig,
}

impl TestContext {
    /// Start a mock upstream and onboard a tenant for [`SHOP_DOMAIN`].
    ///
    /// # Panics
    ///
    /// Panics if onboarding fails.
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());
        let tenant_id = TenantId::generate();
        onboard_tenant(
            store.as_ref(),
            tenant_id,
            SHOP_DOMAIN,
            SecretString::from(ACCESS_TOKEN),
        )
        .await
        .expect("onboard tenant");

        Self {
            server,
            store,
            tenant_id,
            sync_config: SyncConfig {
                max_attempts: 3,
                retry_base_delay: Duration::from_millis(5),
                retry_max_delay: Duration::from_millis(20),
                ..SyncConfig::default()
            },
        }
    }

    /// Client settings pointing at the mock upstream.
    #[must_use]
    pub fn client_config(&self) -> ShopifyClientConfig {
        ShopifyClientConfig {
            base_url: Some(self.server.uri()),
            throttle_delay: Duration::from_millis(5),
            ..ShopifyClientConfig::default()
        }
    }

    /// Orchestrator over the shared store.
    #[must_use]
    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(
            self.store.clone(),
            self.client_config(),
            self.sync_config.clone(),
        )
    }

    /// Application state with the app-level webhook secret configured.
    #[must_use]
    pub fn app_state(&self) -> AppState {
        let shopify = ShopifyConfig {
            webhook_secret: Some(SecretString::from(WEBHOOK_SECRET)),
            ..ShopifyConfig::default()
        };
        AppState::new(self.store.clone(), None, &shopify, self.sync_config.clone())
    }

    /// Run a full sync for the fixture tenant and wait for it.
    ///
    /// # Errors
    ///
    /// Returns whatever the orchestrator returns.
    pub async fn full_sync(&self) -> Result<FullSyncSummary, SyncError> {
        self.orchestrator()
            .perform_full_sync(
                self.tenant_id,
                SHOP_DOMAIN,
                SecretString::from(ACCESS_TOKEN),
                CancellationToken::new(),
            )
            .await
    }

    /// Serve `records` from `GET /{resource}.json` as one page.
    pub async fn serve(&self, resource: &str, records: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/{resource}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(resource, records)))
            .mount(&self.server)
            .await;
    }

    /// Serve `first` then `second` from `GET /{resource}.json` via a `Link` cursor.
    pub async fn serve_two_pages(&self, resource: &str, first: Value, second: Value) {
        let next = format!(
            "<{}/{resource}.json?limit=250&fields=id,email&page_info=page-2>; rel=\"next\"",
            self.server.uri()
        );

        Mock::given(method("GET"))
            .and(path(format!("/{resource}.json")))
            .and(query_param_is_missing("page_info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Link", next.as_str())
                    .set_body_json(envelope(resource, first)),
            )
            .expect(1)
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/{resource}.json")))
            .and(query_param("page_info", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope(resource, second)))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Respond to `GET /{resource}.json` with a bare status code.
    pub async fn fail(&self, resource: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/{resource}.json")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Drop every mounted mock so the next sync sees fresh data.
    pub async fn reset(&self) {
        self.server.reset().await;
    }
}

fn envelope(resource: &str, records: Value) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(resource.to_string(), records);
    Value::Object(body)
}

/// Base64 HMAC-SHA256 of `body` under [`WEBHOOK_SECRET`].
///
/// # Panics
///
/// Never; HMAC accepts keys of any length.
#[must_use]
pub fn sign(body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("valid key length");
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}
