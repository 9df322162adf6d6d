//! Service-boundary error type with Sentry integration.
//!
//! [`SyncError`] is what the orchestrator, webhook processor and onboarding
//! service return. Each variant is one failure class an operator can act on
//! (reconfigure, retry, wait). It converts into an HTTP response that
//! captures server-side classes to Sentry before replying.

use std::time::Duration;

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use shopsync_core::{SyncJobId, TenantId};

use crate::db::RepositoryError;
use crate::shopify::ShopifyError;

/// Failure of a sync, webhook or onboarding call.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Caller input was rejected before any network call.
    #[error("validation error: {0}")]
    Validation(String),

    /// Bad access credential or webhook signature.
    #[error("authentication failed")]
    Authentication,

    /// The credential lacks a required scope.
    #[error("permission denied by upstream store")]
    Permission,

    /// The upstream store or resource does not exist.
    #[error("upstream resource not found: {0}")]
    NotFound(String),

    /// Upstream call budget exhausted after all retries.
    #[error("rate limited by upstream (retry after {}s)", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Upstream 5xx or timeout after all retries.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Any other upstream failure.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// No tenant with this id or domain.
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    /// A full sync for this tenant is already running.
    #[error("a sync is already running for tenant {0}")]
    SyncInProgress(TenantId),

    /// The run was cancelled or hit its deadline.
    #[error("sync cancelled: {0}")]
    Cancelled(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<ShopifyError> for SyncError {
    fn from(err: ShopifyError) -> Self {
        match err {
            ShopifyError::Validation(msg) => Self::Validation(msg),
            ShopifyError::Authentication => Self::Authentication,
            ShopifyError::Permission => Self::Permission,
            ShopifyError::NotFound(what) => Self::NotFound(what),
            ShopifyError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            ShopifyError::UpstreamUnavailable(msg) => Self::UpstreamUnavailable(msg),
            ShopifyError::Upstream(msg) => Self::Upstream(msg),
            ShopifyError::Cancelled => Self::Cancelled("request cancelled".to_string()),
        }
    }
}

impl SyncError {
    /// HTTP status for this failure class.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Permission => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::TenantNotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamUnavailable(_) | Self::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::SyncInProgress(_) => StatusCode::CONFLICT,
            Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure is on our side or upstream's and worth reporting.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Repository(_) | Self::Upstream(_) | Self::UpstreamUnavailable(_)
        )
    }

    /// Message safe to show to an API caller.
    fn public_message(&self) -> String {
        match self {
            Self::Repository(_) => "Internal server error".to_string(),
            Self::Upstream(_) => "External service error".to_string(),
            Self::UpstreamUnavailable(_) => "External service temporarily unavailable".to_string(),
            Self::Authentication => "Invalid credential or signature".to_string(),
            Self::Permission => "Credential lacks the required permissions".to_string(),
            Self::NotFound(_) => "Store not found".to_string(),
            Self::TenantNotFound(_) => "Tenant not found".to_string(),
            Self::RateLimited { .. } => "Rate limited, try again later".to_string(),
            Self::Cancelled(_) => "Sync was cancelled".to_string(),
            Self::Validation(_) | Self::SyncInProgress(_) => self.to_string(),
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status_code();
        let message = self.public_message();
        let mut response = (status, message).into_response();

        if let Self::RateLimited { retry_after } = &self
            && let Ok(value) = HeaderValue::from_str(&retry_after.as_secs().max(1).to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }

        response
    }
}

/// Result type alias for `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Tag the current Sentry scope with the tenant and job being worked on.
///
/// Errors captured while the scope is active are then attributable to a
/// tenant without parsing log lines.
pub fn set_sentry_sync_context(tenant_id: TenantId, job_id: Option<SyncJobId>) {
    sentry::configure_scope(|scope| {
        scope.set_tag("tenant_id", tenant_id);
        if let Some(job_id) = job_id {
            scope.set_tag("sync_job_id", job_id);
        }
    });
}

/// Add a breadcrumb marking progress through a sync.
pub fn add_sync_breadcrumb(message: &str, data: &[(&str, String)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some("sync".to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb
            .data
            .insert((*key).to_string(), serde_json::Value::String(value.clone()));
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shopify_errors_map_to_classes() {
        assert!(matches!(
            SyncError::from(ShopifyError::Authentication),
            SyncError::Authentication
        ));
        assert!(matches!(
            SyncError::from(ShopifyError::UpstreamUnavailable("timeout".into())),
            SyncError::UpstreamUnavailable(_)
        ));
        assert!(matches!(
            SyncError::from(ShopifyError::Cancelled),
            SyncError::Cancelled(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SyncError::Authentication.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(SyncError::Permission.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            SyncError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            SyncError::RateLimited {
                retry_after: Duration::from_secs(2)
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            SyncError::UpstreamUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SyncError::Upstream("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            SyncError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SyncError::SyncInProgress(TenantId::generate()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            SyncError::Repository(RepositoryError::NotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_response_hides_internal_detail() {
        let err = SyncError::Repository(RepositoryError::DataCorruption(
            "secret table layout".into(),
        ));
        assert!(!err.public_message().contains("secret"));

        let err = SyncError::Upstream("raw upstream body".into());
        assert!(!err.public_message().contains("raw upstream"));
    }

    #[test]
    fn test_rate_limited_response_sets_retry_after() {
        let response = SyncError::RateLimited {
            retry_after: Duration::from_secs(4),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from_static("4"))
        );
    }
}
