//! Authenticated REST client for the Shopify Admin API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, LINK, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

use shopsync_core::ExternalId;

use super::ShopifyError;
use super::pagination::{CALL_LIMIT_HEADER, CallLimit, next_page_info};

/// Largest page size the REST API accepts.
pub const PAGE_LIMIT: u32 = 250;

/// Default Admin API version.
pub const DEFAULT_API_VERSION: &str = "2023-10";

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(2);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

const CUSTOMER_FIELDS: &str = "id,email,first_name,last_name,phone,accepts_marketing,\
     total_spent,orders_count,state,tags,created_at,updated_at,last_order_date,addresses";
const PRODUCT_FIELDS: &str = "id,title,handle,body_html,vendor,product_type,status,tags,\
     images,variants,created_at,updated_at";
const ORDER_FIELDS: &str = "id,name,customer,order_number,email,total_price,subtotal_price,\
     total_tax,total_discounts,currency,financial_status,fulfillment_status,tags,note,\
     shipping_address,billing_address,line_items,processed_at,created_at,updated_at";

/// Client tuning knobs.
#[derive(Debug, Clone)]
pub struct ShopifyClientConfig {
    /// Admin API version segment of the base URL.
    pub api_version: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Cool-down inserted after a response reports 80% budget use.
    pub throttle_delay: Duration,
    /// Replaces `https://{domain}/admin/api/{version}` (mock servers).
    pub base_url: Option<String>,
}

impl Default for ShopifyClientConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(10),
            throttle_delay: Duration::from_secs(1),
            base_url: None,
        }
    }
}

/// Source of customer addresses for customers created without an embedded list.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Raw address objects of a customer. Never fails; an empty list on error.
    async fn customer_addresses(
        &self,
        customer_id: &ExternalId,
        cancel: &CancellationToken,
    ) -> Vec<Value>;
}

/// Shopify Admin REST client bound to one store and credential.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    shop_domain: String,
    access_token: SecretString,
    throttle_delay: Duration,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("shop_domain", &self.inner.shop_domain)
            .field("base_url", &self.inner.base_url.as_str())
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// One decoded response page.
struct Page {
    body: Value,
    next_page_info: Option<String>,
}

impl ShopifyClient {
    /// Create a client for a store.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Validation` if the domain or credential is
    /// empty, or the base URL cannot be built.
    pub fn new(
        shop_domain: &str,
        access_token: SecretString,
        config: &ShopifyClientConfig,
    ) -> Result<Self, ShopifyError> {
        let shop_domain = shop_domain.trim();
        if shop_domain.is_empty() {
            return Err(ShopifyError::Validation(
                "store domain is required".to_string(),
            ));
        }
        if access_token.expose_secret().trim().is_empty() {
            return Err(ShopifyError::Validation(
                "access token is required".to_string(),
            ));
        }

        let mut base = config.base_url.clone().unwrap_or_else(|| {
            format!("https://{shop_domain}/admin/api/{}", config.api_version)
        });
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| ShopifyError::Validation(format!("invalid store URL {base}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ShopifyError::Upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                shop_domain: shop_domain.to_string(),
                access_token,
                throttle_delay: config.throttle_delay,
            }),
        })
    }

    /// Store domain this client is bound to.
    #[must_use]
    pub fn shop_domain(&self) -> &str {
        &self.inner.shop_domain
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Fetch every customer, optionally only those after `since_id`.
    ///
    /// # Errors
    ///
    /// Returns the mapped `ShopifyError` of the first failing page.
    #[instrument(skip(self, cancel), fields(shop = %self.inner.shop_domain))]
    pub async fn fetch_customers(
        &self,
        since_id: Option<&ExternalId>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, ShopifyError> {
        let mut params = vec![("fields", CUSTOMER_FIELDS.to_string())];
        if let Some(id) = since_id {
            params.push(("since_id", id.to_string()));
        }
        self.fetch_all_pages("customers", &params, cancel).await
    }

    /// Fetch every product, optionally only those after `since_id`.
    ///
    /// # Errors
    ///
    /// Returns the mapped `ShopifyError` of the first failing page.
    #[instrument(skip(self, cancel), fields(shop = %self.inner.shop_domain))]
    pub async fn fetch_products(
        &self,
        since_id: Option<&ExternalId>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, ShopifyError> {
        let mut params = vec![("fields", PRODUCT_FIELDS.to_string())];
        if let Some(id) = since_id {
            params.push(("since_id", id.to_string()));
        }
        self.fetch_all_pages("products", &params, cancel).await
    }

    /// Fetch every order matching `status` (`any`, `open`, `closed`, ...).
    ///
    /// # Errors
    ///
    /// Returns the mapped `ShopifyError` of the first failing page.
    #[instrument(skip(self, cancel), fields(shop = %self.inner.shop_domain))]
    pub async fn fetch_orders(
        &self,
        since_id: Option<&ExternalId>,
        status: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, ShopifyError> {
        let mut params = vec![
            ("status", status.to_string()),
            ("fields", ORDER_FIELDS.to_string()),
        ];
        if let Some(id) = since_id {
            params.push(("since_id", id.to_string()));
        }
        self.fetch_all_pages("orders", &params, cancel).await
    }

    /// Fetch the address book of one customer.
    ///
    /// # Errors
    ///
    /// Returns the mapped `ShopifyError` on failure.
    pub async fn fetch_customer_addresses(
        &self,
        customer_id: &ExternalId,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, ShopifyError> {
        let url = self.resource_url(&format!("customers/{customer_id}/addresses.json"))?;
        let page = self.get(url, cancel).await?;
        Ok(take_array(page.body, "addresses").unwrap_or_default())
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Walk every page of a collection endpoint and concatenate the results.
    async fn fetch_all_pages(
        &self,
        resource: &str,
        params: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, ShopifyError> {
        let path = format!("{resource}.json");
        let mut records = Vec::new();
        let mut page_info: Option<String> = None;
        let mut pages = 0_u32;

        loop {
            let mut url = self.resource_url(&path)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("limit", &PAGE_LIMIT.to_string());
                match &page_info {
                    // Cursor pages reject filters other than limit and fields.
                    Some(cursor) => {
                        for (key, value) in params.iter().filter(|(k, _)| *k == "fields") {
                            query.append_pair(key, value);
                        }
                        query.append_pair("page_info", cursor);
                    }
                    None => {
                        for (key, value) in params {
                            query.append_pair(key, value);
                        }
                    }
                }
            }

            let page = self.get(url, cancel).await?;
            pages += 1;

            let batch = take_array(page.body, resource).ok_or_else(|| {
                ShopifyError::Upstream(format!("response is missing the `{resource}` array"))
            })?;
            records.extend(batch);

            match page.next_page_info {
                Some(next) => page_info = Some(next),
                None => break,
            }
        }

        debug!(resource, pages, count = records.len(), "Fetched collection");
        Ok(records)
    }

    fn resource_url(&self, path: &str) -> Result<Url, ShopifyError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ShopifyError::Validation(format!("invalid resource path {path}: {e}")))
    }

    /// Issue one GET, honoring cancellation for the whole exchange.
    async fn get(&self, url: Url, cancel: &CancellationToken) -> Result<Page, ShopifyError> {
        if cancel.is_cancelled() {
            return Err(ShopifyError::Cancelled);
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ShopifyError::Cancelled),
            page = self.send(url) => page,
        }
    }

    async fn send(&self, url: Url) -> Result<Page, ShopifyError> {
        let path = url.path().to_string();
        let response = self
            .inner
            .http
            .get(url)
            .header(ACCESS_TOKEN_HEADER, self.inner.access_token.expose_secret())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &headers, &path, &body));
        }

        let next_page_info = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_info);
        let call_limit = response
            .headers()
            .get(CALL_LIMIT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(CallLimit::parse);

        let body: Value = response
            .json()
            .await
            .map_err(|e| ShopifyError::Upstream(format!("invalid JSON response: {e}")))?;

        if let Some(limit) = call_limit
            && limit.is_near_limit()
        {
            debug!(
                current = limit.current,
                max = limit.max,
                "Call budget above 80%, cooling down"
            );
            tokio::time::sleep(self.inner.throttle_delay).await;
        }

        Ok(Page {
            body,
            next_page_info,
        })
    }
}

#[async_trait]
impl AddressSource for ShopifyClient {
    async fn customer_addresses(
        &self,
        customer_id: &ExternalId,
        cancel: &CancellationToken,
    ) -> Vec<Value> {
        match self.fetch_customer_addresses(customer_id, cancel).await {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!(external_id = %customer_id, error = %e, "Failed to fetch customer addresses");
                Vec::new()
            }
        }
    }
}

/// Pull the array stored under `key` out of a response object.
fn take_array(body: Value, key: &str) -> Option<Vec<Value>> {
    match body {
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn map_transport_error(err: reqwest::Error) -> ShopifyError {
    if err.is_timeout() {
        ShopifyError::UpstreamUnavailable("request timed out".to_string())
    } else if err.is_connect() {
        ShopifyError::UpstreamUnavailable(format!("connection failed: {err}"))
    } else {
        ShopifyError::Upstream(err.to_string())
    }
}

fn map_status(status: StatusCode, headers: &HeaderMap, path: &str, body: &str) -> ShopifyError {
    match status {
        StatusCode::UNAUTHORIZED => ShopifyError::Authentication,
        StatusCode::FORBIDDEN => ShopifyError::Permission,
        StatusCode::NOT_FOUND => ShopifyError::NotFound(path.to_string()),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<f64>().ok())
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .map_or(DEFAULT_RETRY_AFTER, |wait| wait.min(MAX_RETRY_AFTER));
            ShopifyError::RateLimited { retry_after }
        }
        s if s.is_server_error() => ShopifyError::UpstreamUnavailable(format!("HTTP {s}")),
        s => ShopifyError::Upstream(format!("HTTP {s}: {}", error_message(body))),
    }
}

/// Best-effort extraction of the `errors` field of an error body.
fn error_message(body: &str) -> String {
    const MAX_LEN: usize = 200;

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("errors").cloned())
        .map_or_else(
            || body.to_string(),
            |errors| match errors {
                Value::String(s) => s,
                other => other.to_string(),
            },
        );
    message.chars().take(MAX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ShopifyClient {
        let config = ShopifyClientConfig {
            base_url: Some(server.uri()),
            throttle_delay: Duration::from_millis(10),
            ..ShopifyClientConfig::default()
        };
        ShopifyClient::new(
            "demo.myshopify.com",
            SecretString::from("shpat_test"),
            &config,
        )
        .expect("client")
    }

    #[test]
    fn test_new_rejects_missing_credentials() {
        let config = ShopifyClientConfig::default();
        assert!(matches!(
            ShopifyClient::new("", SecretString::from("token"), &config),
            Err(ShopifyError::Validation(_))
        ));
        assert!(matches!(
            ShopifyClient::new("demo.myshopify.com", SecretString::from("  "), &config),
            Err(ShopifyError::Validation(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = ShopifyClient::new(
            "demo.myshopify.com",
            SecretString::from("shpat_secret"),
            &ShopifyClientConfig::default(),
        )
        .expect("client");
        let debug = format!("{client:?}");
        assert!(!debug.contains("shpat_secret"));
        assert!(debug.contains("demo.myshopify.com"));
    }

    #[tokio::test]
    async fn test_fetch_customers_walks_every_page() {
        let server = MockServer::start().await;
        let next = format!(
            "<{}/customers.json?limit=250&fields=id,email&page_info=cursor2>; rel=\"next\"",
            server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/customers.json"))
            .and(header("X-Shopify-Access-Token", "shpat_test"))
            .and(query_param("limit", "250"))
            .and(query_param_is_missing("page_info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Link", next.as_str())
                    .set_body_json(json!({"customers": [{"id": 1}, {"id": 2}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/customers.json"))
            .and(query_param("page_info", "cursor2"))
            .and(query_param_is_missing("since_id"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"customers": [{"id": 3}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let since = ExternalId::new("0").expect("id");
        let customers = client_for(&server)
            .fetch_customers(Some(&since), &CancellationToken::new())
            .await
            .expect("fetch");

        let ids: Vec<i64> = customers
            .iter()
            .filter_map(|c| c["id"].as_i64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_orders_sends_status_filter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/orders.json"))
            .and(query_param("status", "any"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"orders": []})))
            .expect(1)
            .mount(&server)
            .await;

        let orders = client_for(&server)
            .fetch_orders(None, "any", &CancellationToken::new())
            .await
            .expect("fetch");
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_status_codes_map_to_error_classes() {
        let cases = [
            (401, "auth"),
            (403, "permission"),
            (404, "not_found"),
            (429, "rate_limited"),
            (503, "unavailable"),
            (422, "upstream"),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/products.json"))
                .respond_with(
                    ResponseTemplate::new(status)
                        .insert_header("Retry-After", "3")
                        .set_body_json(json!({"errors": "nope"})),
                )
                .mount(&server)
                .await;

            let err = client_for(&server)
                .fetch_products(None, &CancellationToken::new())
                .await
                .expect_err("error status");

            let actual = match &err {
                ShopifyError::Authentication => "auth",
                ShopifyError::Permission => "permission",
                ShopifyError::NotFound(_) => "not_found",
                ShopifyError::RateLimited { retry_after } => {
                    assert_eq!(*retry_after, Duration::from_secs(3));
                    "rate_limited"
                }
                ShopifyError::UpstreamUnavailable(_) => "unavailable",
                ShopifyError::Upstream(msg) => {
                    assert!(msg.contains("nope"));
                    "upstream"
                }
                other => panic!("unexpected error: {other:?}"),
            };
            assert_eq!(actual, expected, "status {status}");
        }
    }

    #[tokio::test]
    async fn test_retry_after_is_clamped_or_defaulted() {
        let cases = [
            ("1e30", MAX_RETRY_AFTER),
            ("999999", MAX_RETRY_AFTER),
            ("-5", DEFAULT_RETRY_AFTER),
            ("NaN", DEFAULT_RETRY_AFTER),
            ("soon", DEFAULT_RETRY_AFTER),
            ("1.5", Duration::from_millis(1500)),
        ];

        for (value, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/products.json"))
                .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", value))
                .mount(&server)
                .await;

            let err = client_for(&server)
                .fetch_products(None, &CancellationToken::new())
                .await
                .expect_err("rate limited");
            match err {
                ShopifyError::RateLimited { retry_after } => {
                    assert_eq!(retry_after, expected, "Retry-After: {value}");
                }
                other => panic!("unexpected error for {value}: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({"products": []})),
            )
            .mount(&server)
            .await;

        let config = ShopifyClientConfig {
            base_url: Some(server.uri()),
            request_timeout: Duration::from_millis(50),
            ..ShopifyClientConfig::default()
        };
        let client = ShopifyClient::new("demo.myshopify.com", SecretString::from("t"), &config)
            .expect("client");

        let err = client
            .fetch_products(None, &CancellationToken::new())
            .await
            .expect_err("timeout");
        assert!(matches!(err, ShopifyError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_collection_key_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_products(None, &CancellationToken::new())
            .await
            .expect_err("bad shape");
        assert!(matches!(err, ShopifyError::Upstream(_)));
    }

    async fn timed_fetch(call_limit: &str, throttle_delay: Duration) -> (usize, Duration) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(CALL_LIMIT_HEADER, call_limit)
                    .set_body_json(json!({"products": [{"id": 5}]})),
            )
            .mount(&server)
            .await;

        let config = ShopifyClientConfig {
            base_url: Some(server.uri()),
            throttle_delay,
            ..ShopifyClientConfig::default()
        };
        let client = ShopifyClient::new("demo.myshopify.com", SecretString::from("t"), &config)
            .expect("client");

        let started = std::time::Instant::now();
        let products = client
            .fetch_products(None, &CancellationToken::new())
            .await
            .expect("fetch");
        (products.len(), started.elapsed())
    }

    #[tokio::test]
    async fn test_near_limit_response_cools_down() {
        let delay = Duration::from_millis(300);
        let (count, elapsed) = timed_fetch("39/40", delay).await;
        assert_eq!(count, 1);
        assert!(elapsed >= delay, "expected a cool-down, took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_under_limit_response_does_not_cool_down() {
        let delay = Duration::from_secs(30);
        let (count, elapsed) =
            tokio::time::timeout(Duration::from_secs(5), timed_fetch("1/40", delay))
                .await
                .expect("no cool-down below the threshold");
        assert_eq!(count, 1);
        assert!(elapsed < delay);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client_for(&server)
            .fetch_customers(None, &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, ShopifyError::Cancelled));
    }

    #[tokio::test]
    async fn test_address_source_degrades_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers/42/addresses.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let id = ExternalId::new("42").expect("id");
        let addresses = client_for(&server)
            .customer_addresses(&id, &CancellationToken::new())
            .await;
        assert!(addresses.is_empty());
    }

    #[tokio::test]
    async fn test_address_source_returns_address_book() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customers/42/addresses.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "addresses": [{"city": "Ottawa", "default": true}]
            })))
            .mount(&server)
            .await;

        let id = ExternalId::new("42").expect("id");
        let addresses = client_for(&server)
            .customer_addresses(&id, &CancellationToken::new())
            .await;
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0]["city"], "Ottawa");
    }

    #[test]
    fn test_error_message_prefers_errors_field() {
        assert_eq!(error_message(r#"{"errors":"Not allowed"}"#), "Not allowed");
        assert_eq!(error_message("plain text"), "plain text");
    }
}
