//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required (server and CLI database commands)
//! - `SHOPSYNC_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `SHOPSYNC_HOST` - Bind address (default: 127.0.0.1)
//! - `SHOPSYNC_PORT` - Listen port (default: 3002)
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2023-10)
//! - `SHOPIFY_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `SHOPIFY_THROTTLE_DELAY_MS` - Cool-down when the call budget is 80% used (default: 1000)
//! - `SHOPIFY_WEBHOOK_SECRET` - App-level webhook signing secret (high entropy)
//! - `SYNC_MAX_ATTEMPTS` - Attempts per fetch phase on retryable errors (default: 3)
//! - `SYNC_RETRY_BASE_DELAY_MS` - First retry delay, doubled per attempt (default: 500)
//! - `SYNC_JOB_TIMEOUT_SECS` - Overall deadline for one full sync (default: none)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use secrecy::SecretString;
use thiserror::Error;

use crate::shopify::ShopifyClientConfig;
use crate::shopify::client::DEFAULT_API_VERSION;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Upstream API settings
    pub shopify: ShopifyConfig,
    /// Orchestrator settings
    pub sync: SyncConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 - 1.0)
    pub sentry_sample_rate: f32,
}

/// Shopify Admin API settings shared by every tenant.
///
/// Implements `Debug` manually to redact the webhook secret.
#[derive(Clone)]
pub struct ShopifyConfig {
    /// Admin API version (e.g., 2023-10)
    pub api_version: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Cool-down inserted when the call budget is nearly spent
    pub throttle_delay: Duration,
    /// App-level webhook signing secret, used when a tenant has none
    pub webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .field("throttle_delay", &self.throttle_delay)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        let client = ShopifyClientConfig::default();
        Self {
            api_version: client.api_version,
            request_timeout: client.request_timeout,
            throttle_delay: client.throttle_delay,
            webhook_secret: None,
        }
    }
}

impl ShopifyConfig {
    /// Client settings derived from this configuration.
    #[must_use]
    pub fn client_config(&self) -> ShopifyClientConfig {
        ShopifyClientConfig {
            api_version: self.api_version.clone(),
            request_timeout: self.request_timeout,
            throttle_delay: self.throttle_delay,
            base_url: None,
        }
    }
}

/// Full-sync orchestration settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Attempts per fetch phase (1 = no retry)
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further attempt
    pub retry_base_delay: Duration,
    /// Upper bound for a single retry delay
    pub retry_max_delay: Duration,
    /// Overall deadline for one full sync
    pub job_timeout: Option<Duration>,
    /// Order status filter passed to the orders endpoint
    pub order_status: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            job_timeout: None,
            order_status: "any".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the webhook secret fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SHOPSYNC_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("SHOPSYNC_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("SHOPSYNC_PORT", "3002")?;

        let shopify = ShopifyConfig::from_env()?;
        let sync = SyncConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_parsed_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?;

        Ok(Self {
            database_url,
            host,
            port,
            shopify,
            sync,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ShopifyConfig {
    /// Load the upstream settings alone (no database URL required).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable values or an insecure webhook secret.
    pub fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = match get_optional_env("SHOPIFY_WEBHOOK_SECRET") {
            Some(value) => {
                validate_secret_strength(&value, "SHOPIFY_WEBHOOK_SECRET")?;
                Some(SecretString::from(value))
            }
            None => None,
        };

        Ok(Self {
            api_version: get_env_or_default("SHOPIFY_API_VERSION", DEFAULT_API_VERSION),
            request_timeout: Duration::from_secs(get_parsed_or_default(
                "SHOPIFY_REQUEST_TIMEOUT_SECS",
                "10",
            )?),
            throttle_delay: Duration::from_millis(get_parsed_or_default(
                "SHOPIFY_THROTTLE_DELAY_MS",
                "1000",
            )?),
            webhook_secret,
        })
    }
}

impl SyncConfig {
    /// Load the orchestrator settings alone.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for unparsable values or zero attempts.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_attempts: u32 = get_parsed_or_default("SYNC_MAX_ATTEMPTS", "3")?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let retry_base_delay =
            Duration::from_millis(get_parsed_or_default("SYNC_RETRY_BASE_DELAY_MS", "500")?);
        let job_timeout = get_optional_env("SYNC_JOB_TIMEOUT_SECS")
            .map(|v| parse_value::<u64>("SYNC_JOB_TIMEOUT_SECS", &v))
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            max_attempts,
            retry_base_delay,
            job_timeout,
            ..defaults
        })
    }

    /// Delay before retry number `attempt` (1-based) of a fetch phase.
    ///
    /// Exponential in the attempt, capped at `retry_max_delay`, with up to
    /// 25% jitter either way.
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2_u32.saturating_pow(attempt - 1);
        let capped = self
            .retry_base_delay
            .saturating_mul(factor)
            .min(self.retry_max_delay);

        let jitter = rand::rng().random_range(0.75..=1.25);
        capped.mul_f64(jitter)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_bounds() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_webhook_secret_rejects_placeholder() {
        let result = validate_secret_strength("your-webhook-signing-key", "SHOPIFY_WEBHOOK_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_webhook_secret_rejects_low_entropy() {
        let result = validate_secret_strength("abababababababab", "SHOPIFY_WEBHOOK_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_webhook_secret_accepts_random_value() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "SHOPIFY_WEBHOOK_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_value_reports_variable() {
        let err = parse_value::<u16>("SHOPSYNC_PORT", "http").expect_err("invalid port");
        assert!(err.to_string().contains("SHOPSYNC_PORT"));
        assert_eq!(parse_value::<u16>("SHOPSYNC_PORT", " 3002 ").ok(), Some(3002));
    }

    #[test]
    fn test_sync_defaults() {
        let sync = SyncConfig::default();
        assert_eq!(sync.max_attempts, 3);
        assert_eq!(sync.retry_base_delay, Duration::from_millis(500));
        assert_eq!(sync.order_status, "any");
        assert!(sync.job_timeout.is_none());
    }

    #[test]
    fn test_retry_delay_grows_and_caps() {
        let sync = SyncConfig {
            retry_base_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_millis(1000),
            ..SyncConfig::default()
        };

        assert_eq!(sync.retry_delay(0), Duration::ZERO);

        let first = sync.retry_delay(1);
        assert!(first >= Duration::from_millis(75) && first <= Duration::from_millis(125));

        let third = sync.retry_delay(3);
        assert!(third >= Duration::from_millis(300) && third <= Duration::from_millis(500));

        let capped = sync.retry_delay(20);
        assert!(capped <= Duration::from_millis(1250));
    }

    #[test]
    fn test_shopify_config_debug_redacts_secret() {
        let config = ShopifyConfig {
            webhook_secret: Some(SecretString::from("super_sensitive_value")),
            ..ShopifyConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super_sensitive_value"));
        assert_eq!(config.client_config().api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn test_socket_addr() {
        let config = EngineConfig {
            database_url: SecretString::from("postgres://localhost/shopsync"),
            host: "127.0.0.1".parse().expect("ip"),
            port: 3002,
            shopify: ShopifyConfig::default(),
            sync: SyncConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3002);
    }
}
