//! Shopify Admin REST API access.
//!
//! # Architecture
//!
//! - [`ShopifyClient`] issues authenticated `GET` requests, walks `Link`
//!   header pagination and self-throttles on the call-limit header
//! - [`pagination`] holds the header parsing helpers
//! - [`conversions`] decodes raw JSON payloads into typed records
//!
//! The client returns raw `serde_json::Value` entities; decoding happens per
//! record in the reconciler so that one malformed record cannot fail a page.
//!
//! # Example
//!
//! ```rust,ignore
//! use shopsync_engine::shopify::{ShopifyClient, ShopifyClientConfig};
//!
//! let client = ShopifyClient::new("demo.myshopify.com", token, &ShopifyClientConfig::default())?;
//! let customers = client.fetch_customers(None, &cancel).await?;
//! ```

pub mod client;
pub mod conversions;
pub mod pagination;

pub use client::{AddressSource, ShopifyClient, ShopifyClientConfig};

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// Caller supplied no usable store domain or credential.
    #[error("validation error: {0}")]
    Validation(String),

    /// 401: the access credential was rejected.
    #[error("invalid Shopify access token")]
    Authentication,

    /// 403: the credential lacks a required scope.
    #[error("access denied, check the app's API scopes")]
    Permission,

    /// 404: unknown store domain or resource.
    #[error("Shopify store or resource not found: {0}")]
    NotFound(String),

    /// 429: call budget exhausted.
    #[error("rate limited by Shopify, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// Delay advertised by `Retry-After` (defaults to 2s).
        retry_after: Duration,
    },

    /// 5xx, timeout or connection failure.
    #[error("Shopify unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Any other unexpected response.
    #[error("Shopify API error: {0}")]
    Upstream(String),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
}

impl ShopifyError {
    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::UpstreamUnavailable(_))
    }
}

/// Normalize a user-supplied store URL to a bare `*.myshopify.com`-style domain.
///
/// Accepts `https://demo.myshopify.com/admin`, `demo.myshopify.com` or just
/// `demo`. Bare shop names get `.myshopify.com` appended; custom domains are
/// kept as-is.
///
/// # Errors
///
/// Returns `ShopifyError::Validation` for empty or host-less input.
pub fn normalize_store_domain(input: &str) -> Result<String, ShopifyError> {
    let trimmed = input.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('.')
        .to_ascii_lowercase();

    if host.is_empty() {
        return Err(ShopifyError::Validation(
            "store URL is required".to_string(),
        ));
    }
    if host
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == ':'))
    {
        return Err(ShopifyError::Validation(format!(
            "invalid store URL: {trimmed}"
        )));
    }

    if host.contains('.') {
        Ok(host)
    } else {
        Ok(format!("{host}.myshopify.com"))
    }
}
