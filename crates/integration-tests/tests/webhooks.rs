//! Webhook deliveries through the HTTP router.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use shopsync_engine::routes::routes;
use shopsync_engine::routes::webhooks::{HMAC_HEADER, SHOP_DOMAIN_HEADER, TOPIC_HEADER};
use shopsync_integration_tests::{SHOP_DOMAIN, TestContext, sign};

fn delivery(topic: &str, body: Vec<u8>, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks")
        .header(TOPIC_HEADER, topic)
        .header(SHOP_DOMAIN_HEADER, SHOP_DOMAIN)
        .header(HMAC_HEADER, signature)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .expect("request")
}

async fn post(ctx: &TestContext, topic: &str, payload: &serde_json::Value) -> StatusCode {
    let body = serde_json::to_vec(payload).expect("json");
    let signature = sign(&body);
    routes()
        .with_state(ctx.app_state())
        .oneshot(delivery(topic, body, &signature))
        .await
        .expect("response")
        .status()
}

#[tokio::test]
async fn test_webhooks_apply_incremental_updates() {
    let ctx = TestContext::new().await;

    let status = post(
        &ctx,
        "customers/create",
        &json!({"id": 900, "email": "a@b.com", "addresses": [{"address1": "1 Main St"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let status = post(
        &ctx,
        "products/create",
        &json!({"id": 10, "title": "Tee", "variants": [{"id": 11, "price": "20.00", "sku": "TEE"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let status = post(
        &ctx,
        "orders/paid",
        &json!({"id": 500, "customer": {"id": 900}, "total_price": "20.00",
                "line_items": [{"id": 1, "product_id": 10, "variant_id": 11, "quantity": 1}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let customer = ctx.store.customer(ctx.tenant_id, "900").await.expect("customer");
    assert_eq!(ctx.store.addresses(customer.id).await.len(), 1);
    let order = ctx.store.order(ctx.tenant_id, "500").await.expect("order");
    assert_eq!(order.customer_id, Some(customer.id));
    let items = ctx.store.line_items(order.id).await;
    assert!(items.first().is_some_and(|i| i.item.product_exists));

    // Webhooks never create sync jobs
    assert!(ctx.store.sync_jobs(ctx.tenant_id).await.is_empty());
}

#[tokio::test]
async fn test_update_webhook_without_addresses_keeps_them() {
    let ctx = TestContext::new().await;
    post(
        &ctx,
        "customers/create",
        &json!({"id": 900, "addresses": [{"address1": "1 Main St"}]}),
    )
    .await;
    post(&ctx, "customers/update", &json!({"id": 900, "email": "new@b.com"})).await;

    let customer = ctx.store.customer(ctx.tenant_id, "900").await.expect("customer");
    assert_eq!(customer.email.as_deref(), Some("new@b.com"));
    assert_eq!(ctx.store.addresses(customer.id).await.len(), 1);
    assert_eq!(ctx.store.customers(ctx.tenant_id).await.len(), 1);
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let ctx = TestContext::new().await;
    let body = serde_json::to_vec(&json!({"id": 900, "email": "a@b.com"})).expect("json");
    let signature = sign(&body);

    let mut tampered = body;
    if let Some(byte) = tampered.last_mut() {
        *byte ^= 0x20;
    }

    let response = routes()
        .with_state(ctx.app_state())
        .oneshot(delivery("customers/create", tampered, &signature))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(ctx.store.customers(ctx.tenant_id).await.is_empty());
}

#[tokio::test]
async fn test_behavioral_topics_record_events() {
    let ctx = TestContext::new().await;

    assert_eq!(
        post(&ctx, "carts/create", &json!({"token": "cart-1", "line_items": []})).await,
        StatusCode::OK
    );
    assert_eq!(
        post(&ctx, "checkouts/create", &json!({"token": "chk-1", "cart_token": "cart-1"})).await,
        StatusCode::OK
    );
    assert_eq!(post(&ctx, "shop/update", &json!({})).await, StatusCode::OK);

    let events = ctx.store.events(ctx.tenant_id).await;
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, ["cart_created", "checkout_started"]);
}
