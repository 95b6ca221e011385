//! Sync service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SYNC_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_ADMIN_ACCESS_TOKEN` - Admin API access token
//! - `SHOPIFY_WEBHOOK_SECRET` - Shared secret used to sign webhook deliveries
//!
//! ## Optional
//! - `SYNC_HOST` - Bind address (default: 127.0.0.1)
//! - `SYNC_PORT` - Listen port (default: 3100)
//! - `SHOPIFY_API_VERSION` - API version (default: 2026-01)
//! - `SHOPIFY_REQUEST_TIMEOUT_SECS` - Per-request timeout for Shopify calls (default: 10)
//! - `PLATFORM_CACHE_TTL_SECS` - TTL for cached location and rate lookups (default: 300)
//! - `DEFAULT_MARKET` - Market used when a checkout has no country (default: US)
//! - `DEFAULT_STOREFRONT` - Storefront assumed for cart lines without one (default: main)
//! - `DEFAULT_SHIPPING_RATE` - Fallback shipping estimate amount (default: 9.95)
//! - `DEFAULT_SHIPPING_CURRENCY` - Fallback shipping estimate currency (default: USD)
//! - `DEFAULT_DELIVERY_DAYS` - Fallback delivery window, e.g. `3-7` (default: 3-7)
//! - `SHIPPING_ESTIMATES` - Per-market estimates, e.g. `CA:14.95:CAD:5-10,GB:19.95:GBP:7-14`
//! - `CHECKOUT_CHECK_TIMEOUT_SECS` - Timeout for each checkout check (default: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use shopfleet_core::{
    CurrencyCode, DeliveryEstimate, MarketCode, PipelineDefaults, ShippingEstimate, StorefrontId,
};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
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

/// Sync service configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Shopify Admin API configuration
    pub shopify: ShopifyAdminConfig,
    /// Market and shipping fallbacks
    pub defaults: PipelineDefaults,
    /// Timeout applied to each checkout check
    pub checkout_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Shopify Admin API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct ShopifyAdminConfig {
    /// Shopify store domain (e.g., your-store.myshopify.com)
    pub store: String,
    /// Shopify API version (e.g., 2026-01)
    pub api_version: String,
    /// Admin API access token
    pub access_token: SecretString,
    /// Webhook signing secret
    pub webhook_secret: SecretString,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// TTL for cached location and shipping rate lookups
    pub cache_ttl: Duration,
}

impl std::fmt::Debug for ShopifyAdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyAdminConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("access_token", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SYNC_DATABASE_URL")?;
        let host = parse_env("SYNC_HOST", "127.0.0.1")?;
        let port = parse_env("SYNC_PORT", "3100")?;
        let shopify = ShopifyAdminConfig::from_env()?;
        let defaults = defaults_from_env()?;
        let checkout_timeout = Duration::from_secs(parse_env("CHECKOUT_CHECK_TIMEOUT_SECS", "5")?);

        Ok(Self {
            database_url,
            host,
            port,
            shopify,
            defaults,
            checkout_timeout,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ShopifyAdminConfig {
    /// Load the Shopify section on its own (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing or a secret is weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store: get_required_env("SHOPIFY_STORE")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2026-01"),
            access_token: get_validated_secret("SHOPIFY_ADMIN_ACCESS_TOKEN")?,
            webhook_secret: get_validated_secret("SHOPIFY_WEBHOOK_SECRET")?,
            request_timeout: Duration::from_secs(parse_env("SHOPIFY_REQUEST_TIMEOUT_SECS", "10")?),
            cache_ttl: Duration::from_secs(parse_env("PLATFORM_CACHE_TTL_SECS", "300")?),
        })
    }
}

/// Load the market and shipping fallbacks.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` if an amount, delivery window, or
/// estimate list cannot be parsed.
pub fn defaults_from_env() -> Result<PipelineDefaults, ConfigError> {
    let rate = parse_env::<Decimal>("DEFAULT_SHIPPING_RATE", "9.95")?;
    let currency = CurrencyCode::new(&get_env_or_default("DEFAULT_SHIPPING_CURRENCY", "USD"));
    let delivery_estimate = parse_env::<DeliveryEstimate>("DEFAULT_DELIVERY_DAYS", "3-7")?;
    let shipping_estimates = get_optional_env("SHIPPING_ESTIMATES")
        .map(|raw| parse_shipping_estimates(&raw))
        .transpose()
        .map_err(|e| ConfigError::InvalidEnvVar("SHIPPING_ESTIMATES".to_string(), e))?
        .unwrap_or_default();

    Ok(PipelineDefaults {
        default_market: MarketCode::new(&get_env_or_default("DEFAULT_MARKET", "US")),
        default_storefront: StorefrontId::new(get_env_or_default("DEFAULT_STOREFRONT", "main")),
        default_shipping: ShippingEstimate {
            rate,
            currency,
            delivery_estimate,
        },
        shipping_estimates,
    })
}

/// Parse `MARKET:RATE:CURRENCY:DAYS` entries separated by commas.
fn parse_shipping_estimates(raw: &str) -> Result<BTreeMap<MarketCode, ShippingEstimate>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
            let [market, rate, currency, days] = parts.as_slice() else {
                return Err(format!("expected MARKET:RATE:CURRENCY:DAYS, got '{entry}'"));
            };
            let rate = Decimal::from_str(rate).map_err(|e| format!("{entry}: {e}"))?;
            let delivery_estimate =
                DeliveryEstimate::from_str(days).map_err(|e| format!("{entry}: {e}"))?;
            Ok((
                MarketCode::new(market),
                ShippingEstimate {
                    rate,
                    currency: CurrencyCode::new(currency),
                    delivery_estimate,
                },
            ))
        })
        .collect()
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

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

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default literal.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
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

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-webhook-key", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("shpat_9fK2mQ7xL4vB8nR1tZ6cW3", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_shipping_estimates() {
        let estimates = parse_shipping_estimates("CA:14.95:CAD:5-10, gb:19.95:gbp:7").unwrap();
        assert_eq!(estimates.len(), 2);

        let ca = &estimates[&MarketCode::new("CA")];
        assert_eq!(ca.rate, Decimal::new(1495, 2));
        assert_eq!(ca.currency, CurrencyCode::new("CAD"));
        assert_eq!(ca.delivery_estimate, DeliveryEstimate::new(5, 10));

        let gb = &estimates[&MarketCode::new("GB")];
        assert_eq!(gb.currency, CurrencyCode::new("GBP"));
        assert_eq!(gb.delivery_estimate, DeliveryEstimate::new(7, 7));
    }

    #[test]
    fn test_parse_shipping_estimates_rejects_malformed_entry() {
        assert!(parse_shipping_estimates("CA:14.95").is_err());
        assert!(parse_shipping_estimates("CA:abc:CAD:5-10").is_err());
        assert!(parse_shipping_estimates("").unwrap().is_empty());
    }

    #[test]
    fn test_shopify_config_debug_redacts_secrets() {
        let config = ShopifyAdminConfig {
            store: "test.myshopify.com".to_string(),
            api_version: "2026-01".to_string(),
            access_token: SecretString::from("shpat_super_private_token"),
            webhook_secret: SecretString::from("whsec_super_private_value"),
            request_timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(300),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("test.myshopify.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("shpat_super_private_token"));
        assert!(!debug_output.contains("whsec_super_private_value"));
    }
}
