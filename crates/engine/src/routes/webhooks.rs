//! Webhook intake endpoint.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::debug;

use crate::error::SyncError;
use crate::services::webhooks::WebhookOutcome;
use crate::state::AppState;

/// Topic of the delivery, e.g. `orders/create`.
pub const TOPIC_HEADER: &str = "x-shopify-topic";
/// Base64 HMAC-SHA256 of the raw body.
pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
/// Store domain the delivery belongs to.
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";

/// Receive a webhook delivery.
///
/// The raw body is verified before it is parsed. Unknown topics are accepted
/// and ignored so the upstream does not keep retrying them.
///
/// # Errors
///
/// - 400 if the topic or shop header is missing
/// - 401 if the signature is missing or does not match
/// - 404 if no tenant owns the shop domain
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, SyncError> {
    let topic = header_str(&headers, TOPIC_HEADER)
        .ok_or_else(|| SyncError::Validation(format!("missing {TOPIC_HEADER} header")))?;
    let shop_domain = header_str(&headers, SHOP_DOMAIN_HEADER)
        .ok_or_else(|| SyncError::Validation(format!("missing {SHOP_DOMAIN_HEADER} header")))?;
    let signature = header_str(&headers, HMAC_HEADER).ok_or(SyncError::Authentication)?;

    let outcome = state
        .webhooks()
        .process_for_shop(shop_domain, topic, &body, signature)
        .await?;

    if outcome == WebhookOutcome::Ignored {
        debug!(topic, "Webhook acknowledged without action");
    }
    Ok(StatusCode::OK)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
