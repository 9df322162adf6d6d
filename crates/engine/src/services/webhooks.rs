//! Webhook verification and single-record dispatch.
//!
//! A delivery is verified against the tenant's signing secret (or the
//! app-level one) and then applied as a one-element reconciliation batch. No
//! sync job is recorded. Cart and checkout topics are stored as custom events.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use sha2::Sha256;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use shopsync_core::{ExternalId, ReconcileStats, TenantId};

use crate::db::SyncStore;
use crate::error::SyncError;
use crate::models::{NewCustomEvent, Tenant};
use crate::reconcile::{Entity, Reconciler};
use crate::shopify::normalize_store_domain;

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook signature.
///
/// `signature` is the base64 HMAC-SHA256 of `body` under `secret`, as sent
/// in the `X-Shopify-Hmac-Sha256` header. The digest comparison is constant
/// time.
#[must_use]
pub fn verify(body: &[u8], signature: &str, secret: &SecretString) -> bool {
    let Ok(provided) = BASE64.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&provided).is_ok()
}

/// Webhook topics this engine acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookTopic {
    CustomersCreate,
    CustomersUpdate,
    OrdersCreate,
    OrdersUpdated,
    OrdersPaid,
    ProductsCreate,
    ProductsUpdate,
    CartsCreate,
    CheckoutsCreate,
}

impl WebhookTopic {
    /// Parse a topic header value. Unknown topics yield `None`.
    #[must_use]
    pub fn parse(topic: &str) -> Option<Self> {
        match topic.trim() {
            "customers/create" => Some(Self::CustomersCreate),
            "customers/update" => Some(Self::CustomersUpdate),
            "orders/create" => Some(Self::OrdersCreate),
            "orders/updated" => Some(Self::OrdersUpdated),
            "orders/paid" => Some(Self::OrdersPaid),
            "products/create" => Some(Self::ProductsCreate),
            "products/update" => Some(Self::ProductsUpdate),
            "carts/create" => Some(Self::CartsCreate),
            "checkouts/create" => Some(Self::CheckoutsCreate),
            _ => None,
        }
    }
}

/// What a delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The payload was reconciled as a single record.
    Reconciled {
        entity: &'static str,
        stats: ReconcileStats,
    },
    /// A custom event was recorded (or its storage failed and was logged).
    EventRecorded { event_type: &'static str },
    /// The topic is not one this engine handles.
    Ignored,
}

/// Verifies and applies webhook deliveries.
#[derive(Clone)]
pub struct WebhookProcessor {
    store: Arc<dyn SyncStore>,
    app_secret: Option<SecretString>,
}

impl WebhookProcessor {
    /// Create a processor. `app_secret` is used for tenants without their own.
    #[must_use]
    pub fn new(store: Arc<dyn SyncStore>, app_secret: Option<SecretString>) -> Self {
        Self { store, app_secret }
    }

    /// Verify and apply a delivery for a tenant.
    ///
    /// # Errors
    ///
    /// - `TenantNotFound` for an unknown tenant
    /// - `Authentication` for a missing secret or a bad signature
    /// - `Validation` if the verified body is not JSON
    /// - `Repository` if the store fails while applying the record
    #[instrument(skip(self, body, signature), fields(tenant_id = %tenant_id))]
    pub async fn process_webhook(
        &self,
        tenant_id: TenantId,
        topic: &str,
        body: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, SyncError> {
        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| SyncError::TenantNotFound(tenant_id.to_string()))?;
        self.apply(&tenant, topic, body, signature).await
    }

    /// Verify and apply a delivery, resolving the tenant by store domain.
    ///
    /// # Errors
    ///
    /// Same as [`process_webhook`](Self::process_webhook).
    #[instrument(skip(self, body, signature))]
    pub async fn process_for_shop(
        &self,
        shop_domain: &str,
        topic: &str,
        body: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, SyncError> {
        let domain = normalize_store_domain(shop_domain)?;
        let tenant = self
            .store
            .find_tenant_by_domain(&domain)
            .await?
            .ok_or_else(|| SyncError::TenantNotFound(domain.clone()))?;
        self.apply(&tenant, topic, body, signature).await
    }

    async fn apply(
        &self,
        tenant: &Tenant,
        topic: &str,
        body: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome, SyncError> {
        let secret = tenant
            .webhook_secret
            .as_ref()
            .or(self.app_secret.as_ref())
            .ok_or_else(|| {
                warn!(tenant_id = %tenant.id, "No webhook secret configured");
                SyncError::Authentication
            })?;

        if !verify(body, signature, secret) {
            warn!(tenant_id = %tenant.id, topic, "Webhook signature mismatch");
            return Err(SyncError::Authentication);
        }

        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| SyncError::Validation(format!("webhook body is not JSON: {e}")))?;

        self.dispatch(tenant.id, topic, &payload).await
    }

    /// Route a verified payload by topic.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Repository` if the store fails while applying the
    /// record, so the delivery is answered with a server error and retried
    /// upstream. Invalid payloads are counted in the returned stats.
    pub async fn dispatch(
        &self,
        tenant_id: TenantId,
        topic: &str,
        payload: &Value,
    ) -> Result<WebhookOutcome, SyncError> {
        let Some(parsed) = WebhookTopic::parse(topic) else {
            info!(tenant_id = %tenant_id, topic, "Ignoring unhandled webhook topic");
            return Ok(WebhookOutcome::Ignored);
        };

        let entity = match parsed {
            WebhookTopic::CustomersCreate | WebhookTopic::CustomersUpdate => Entity::Customer,
            WebhookTopic::OrdersCreate | WebhookTopic::OrdersUpdated | WebhookTopic::OrdersPaid => {
                Entity::Order
            }
            WebhookTopic::ProductsCreate | WebhookTopic::ProductsUpdate => Entity::Product,
            WebhookTopic::CartsCreate | WebhookTopic::CheckoutsCreate => {
                let event_type = if parsed == WebhookTopic::CartsCreate {
                    "cart_created"
                } else {
                    "checkout_started"
                };
                self.record_event(tenant_id, event_type, payload).await;
                return Ok(WebhookOutcome::EventRecorded { event_type });
            }
        };

        // Addresses come only from the payload here; no upstream client is built.
        let cancel = CancellationToken::new();
        let stats = Reconciler::new(self.store.as_ref(), &cancel)
            .store_one(entity, tenant_id, payload)
            .await?;

        info!(
            tenant_id = %tenant_id,
            topic,
            created = stats.created,
            updated = stats.updated,
            errors = stats.errors,
            "Webhook applied"
        );
        Ok(WebhookOutcome::Reconciled {
            entity: entity.as_str(),
            stats,
        })
    }

    /// Store a behavioral event. Failures are logged, never returned.
    async fn record_event(&self, tenant_id: TenantId, event_type: &'static str, payload: &Value) {
        let customer_id = match payload
            .get("customer")
            .and_then(|c| c.get("id"))
            .and_then(ExternalId::from_json)
        {
            Some(external_id) => self
                .store
                .find_customer_id(tenant_id, &external_id)
                .await
                .unwrap_or_else(|e| {
                    warn!(tenant_id = %tenant_id, error = %e, "Customer lookup failed for event");
                    None
                }),
            None => None,
        };

        let session_id = ["token", "cart_token"]
            .iter()
            .find_map(|key| payload.get(*key).and_then(Value::as_str))
            .map(str::to_string);

        let event = NewCustomEvent {
            tenant_id,
            customer_id,
            session_id,
            event_type: event_type.to_string(),
            payload: payload.clone(),
        };

        if let Err(e) = self.store.insert_custom_event(&event).await {
            warn!(tenant_id = %tenant_id, event_type, error = %e, "Failed to record custom event");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::MemoryStore;
    use crate::models::NewTenant;
    use crate::services::tenants::set_webhook_secret;

    const SECRET: &str = "wh_9f8e7d6c5b4a3210fedcba9876543210";

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("valid key length");
        mac.update(body);
        BASE64.encode(mac.finalize().into_bytes())
    }

    async fn setup() -> (Arc<MemoryStore>, WebhookProcessor, TenantId) {
        let store = Arc::new(MemoryStore::new());
        let tenant_id = TenantId::generate();
        store
            .insert_tenant(&NewTenant {
                id: tenant_id,
                name: "Store demo.myshopify.com".to_string(),
                shop_domain: "demo.myshopify.com".to_string(),
                access_token: None,
            })
            .await
            .expect("tenant");
        let processor = WebhookProcessor::new(store.clone(), Some(SecretString::from(SECRET)));
        (store, processor, tenant_id)
    }

    #[test]
    fn test_verify_accepts_matching_signature() {
        let body = br#"{"id":900,"email":"a@b.com"}"#;
        let secret = SecretString::from(SECRET);
        assert!(verify(body, &sign(body, SECRET), &secret));
    }

    #[test]
    fn test_verify_rejects_flipped_byte() {
        let body = br#"{"id":900,"email":"a@b.com"}"#.to_vec();
        let signature = sign(&body, SECRET);
        let secret = SecretString::from(SECRET);

        let mut tampered = body;
        if let Some(byte) = tampered.get_mut(3) {
            *byte ^= 0x01;
        }
        assert!(!verify(&tampered, &signature, &secret));
    }

    #[test]
    fn test_verify_rejects_wrong_secret_and_garbage() {
        let body = b"{}";
        let secret = SecretString::from(SECRET);
        assert!(!verify(body, &sign(body, "another-secret-value"), &secret));
        assert!(!verify(body, "not base64!!", &secret));
        assert!(!verify(body, "", &secret));
    }

    #[test]
    fn test_topic_parse() {
        assert_eq!(
            WebhookTopic::parse("orders/paid"),
            Some(WebhookTopic::OrdersPaid)
        );
        assert_eq!(WebhookTopic::parse("app/uninstalled"), None);
        assert_eq!(
            WebhookTopic::parse(" checkouts/create "),
            Some(WebhookTopic::CheckoutsCreate)
        );
    }

    #[tokio::test]
    async fn test_customer_webhook_upserts_single_record() {
        let (store, processor, tenant_id) = setup().await;
        let body = serde_json::to_vec(&json!({
            "id": 900, "email": "a@b.com", "total_spent": "120.50", "orders_count": 3
        }))
        .expect("json");

        let outcome = processor
            .process_webhook(tenant_id, "customers/create", &body, &sign(&body, SECRET))
            .await
            .expect("processed");
        assert!(matches!(
            outcome,
            WebhookOutcome::Reconciled { entity: "customer", stats } if stats.created == 1
        ));

        let outcome = processor
            .process_webhook(tenant_id, "customers/update", &body, &sign(&body, SECRET))
            .await
            .expect("processed");
        assert!(matches!(
            outcome,
            WebhookOutcome::Reconciled { stats, .. } if stats.updated == 1
        ));
        assert_eq!(store.customers(tenant_id).await.len(), 1);
        assert!(store.sync_jobs(tenant_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected_without_writes() {
        let (store, processor, tenant_id) = setup().await;
        let body = br#"{"id":900}"#;

        let err = processor
            .process_webhook(tenant_id, "customers/create", body, &sign(body, "wrong-secret"))
            .await
            .expect_err("rejected");
        assert!(matches!(err, SyncError::Authentication));
        assert!(store.customers(tenant_id).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_secret_is_authentication_error() {
        let (store, _, tenant_id) = setup().await;
        let processor = WebhookProcessor::new(store, None);
        let body = br#"{"id":900}"#;

        let err = processor
            .process_webhook(tenant_id, "customers/create", body, &sign(body, SECRET))
            .await
            .expect_err("no secret");
        assert!(matches!(err, SyncError::Authentication));
    }

    #[tokio::test]
    async fn test_tenant_secret_takes_precedence() {
        const TENANT_SECRET: &str = "wh_tenant_51c0ffee9d2b7a4e";
        let (store, processor, tenant_id) = setup().await;
        set_webhook_secret(store.as_ref(), tenant_id, Some(SecretString::from(TENANT_SECRET)))
            .await
            .expect("tenant secret");
        let body = br#"{"id":900,"email":"a@b.com"}"#;

        let err = processor
            .process_webhook(tenant_id, "customers/create", body, &sign(body, SECRET))
            .await
            .expect_err("app secret no longer accepted");
        assert!(matches!(err, SyncError::Authentication));

        let without_app_secret = WebhookProcessor::new(store.clone(), None);
        without_app_secret
            .process_webhook(tenant_id, "customers/create", body, &sign(body, TENANT_SECRET))
            .await
            .expect("tenant secret accepted");
        assert!(store.customer(tenant_id, "900").await.is_some());
    }

    #[tokio::test]
    async fn test_unknown_tenant_and_shop() {
        let (_, processor, _) = setup().await;
        let body = b"{}";

        let err = processor
            .process_webhook(TenantId::generate(), "orders/create", body, &sign(body, SECRET))
            .await
            .expect_err("unknown tenant");
        assert!(matches!(err, SyncError::TenantNotFound(_)));

        let err = processor
            .process_for_shop("other.myshopify.com", "orders/create", body, &sign(body, SECRET))
            .await
            .expect_err("unknown shop");
        assert!(matches!(err, SyncError::TenantNotFound(_)));
    }

    #[tokio::test]
    async fn test_process_for_shop_resolves_tenant() {
        let (store, processor, tenant_id) = setup().await;
        let body = serde_json::to_vec(&json!({
            "id": 10, "title": "Tee", "variants": [{"id": 11, "price": "20.00"}]
        }))
        .expect("json");

        let outcome = processor
            .process_for_shop("Demo.myshopify.com", "products/create", &body, &sign(&body, SECRET))
            .await
            .expect("processed");
        assert!(matches!(
            outcome,
            WebhookOutcome::Reconciled { entity: "product", .. }
        ));
        assert!(store.product(tenant_id, "10").await.is_some());
    }

    #[tokio::test]
    async fn test_unknown_topic_is_ignored() {
        let (_, processor, tenant_id) = setup().await;
        let outcome = processor
            .dispatch(tenant_id, "app/uninstalled", &json!({}))
            .await
            .expect("ignored");
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_cart_webhook_records_event() {
        let (store, processor, tenant_id) = setup().await;
        processor
            .dispatch(
                tenant_id,
                "customers/create",
                &json!({"id": 900, "email": "a@b.com"}),
            )
            .await
            .expect("customer");

        let outcome = processor
            .dispatch(
                tenant_id,
                "carts/create",
                &json!({"token": "cart-abc", "customer": {"id": 900}, "line_items": []}),
            )
            .await
            .expect("event");
        assert_eq!(
            outcome,
            WebhookOutcome::EventRecorded {
                event_type: "cart_created"
            }
        );

        let events = store.events(tenant_id).await;
        assert_eq!(events.len(), 1);
        let event = events.first().expect("event");
        assert_eq!(event.event_type, "cart_created");
        assert_eq!(event.session_id.as_deref(), Some("cart-abc"));
        assert!(event.customer_id.is_some());
    }

    #[tokio::test]
    async fn test_malformed_record_is_counted_not_failed() {
        let (_, processor, tenant_id) = setup().await;
        let outcome = processor
            .dispatch(tenant_id, "orders/create", &json!({"total_price": "5.00"}))
            .await
            .expect("processed");
        assert!(matches!(
            outcome,
            WebhookOutcome::Reconciled { entity: "order", stats } if stats.errors == 1
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_returned_for_redelivery() {
        let (store, processor, tenant_id) = setup().await;
        store.set_fail_writes(true);

        let err = processor
            .dispatch(tenant_id, "customers/create", &json!({"id": 900, "email": "a@b.com"}))
            .await
            .expect_err("store down");
        assert!(matches!(err, SyncError::Repository(_)));
        assert!(err.is_server_error());

        store.set_fail_writes(false);
        let outcome = processor
            .dispatch(tenant_id, "customers/create", &json!({"id": 900, "email": "a@b.com"}))
            .await
            .expect("redelivered");
        assert!(matches!(
            outcome,
            WebhookOutcome::Reconciled { entity: "customer", stats } if stats.created == 1
        ));
    }

    #[tokio::test]
    async fn test_event_storage_failure_does_not_fail_delivery() {
        let (store, processor, tenant_id) = setup().await;
        store.set_fail_writes(true);

        let outcome = processor
            .dispatch(tenant_id, "checkouts/create", &json!({"token": "chk-1"}))
            .await
            .expect("logged only");
        assert_eq!(
            outcome,
            WebhookOutcome::EventRecorded {
                event_type: "checkout_started"
            }
        );
        assert!(store.events(tenant_id).await.is_empty());
    }
}
