//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `IRONCART_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `IRONCART_REDIS_URL` - Redis connection string for the refresh-token revocation store
//! - `IRONCART_CLIENT_URL` - Public URL of the web client (payment redirect targets)
//! - `ACCESS_TOKEN_SECRET` - HMAC secret for access tokens (min 32 chars)
//! - `REFRESH_TOKEN_SECRET` - HMAC secret for refresh tokens (min 32 chars)
//! - `STRIPE_SECRET_KEY` - Payment gateway API key
//!
//! ## Optional
//! - `IRONCART_HOST` - Bind address (default: 127.0.0.1)
//! - `IRONCART_PORT` - Listen port (default: 3000)
//! - `IRONCART_SECURE_COOKIES` - Mark auth cookies `Secure` (default: false; set in production)
//! - `COUPON_THRESHOLD_MINOR_UNITS` - Order total that earns a reward coupon (default: 20000)
//! - `COUPON_DISCOUNT_PERCENTAGE` - Discount carried by issued coupons (default: 10)
//! - `COUPON_VALIDITY_DAYS` - Lifetime of issued coupons (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;

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

/// Ironcart server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Redis connection URL for the revocation store
    pub redis_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public URL of the web client, used for payment redirect targets
    pub client_url: String,
    /// Whether auth cookies carry the `Secure` flag
    pub secure_cookies: bool,
    /// Access-token signing secret
    pub access_token_secret: SecretString,
    /// Refresh-token signing secret
    pub refresh_token_secret: SecretString,
    /// Payment gateway API key
    pub stripe_secret_key: SecretString,
    /// Coupon issuance policy
    pub coupon: CouponConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Policy for issuing reward coupons at checkout.
#[derive(Debug, Clone, Copy)]
pub struct CouponConfig {
    /// Minimum discounted order total (minor units) that earns a coupon
    pub threshold_minor_units: i64,
    /// Discount percentage carried by issued coupons
    pub discount_percentage: u8,
    /// Days until an issued coupon expires
    pub validity_days: i64,
}

impl Default for CouponConfig {
    fn default() -> Self {
        Self {
            threshold_minor_units: 20_000,
            discount_percentage: 10,
            validity_days: 30,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if signing secrets fail validation (length, placeholder detection).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("IRONCART_DATABASE_URL")?;
        let redis_url = get_required_secret("IRONCART_REDIS_URL")?;
        let host = get_env_or_default("IRONCART_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("IRONCART_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("IRONCART_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("IRONCART_PORT".to_string(), e.to_string()))?;
        let client_url = get_required_env("IRONCART_CLIENT_URL")?;
        let secure_cookies = get_env_or_default("IRONCART_SECURE_COOKIES", "false")
            .parse::<bool>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("IRONCART_SECURE_COOKIES".to_string(), e.to_string())
            })?;

        let access_token_secret = get_validated_token_secret("ACCESS_TOKEN_SECRET")?;
        let refresh_token_secret = get_validated_token_secret("REFRESH_TOKEN_SECRET")?;
        let stripe_secret_key = get_required_secret("STRIPE_SECRET_KEY")?;

        let coupon = CouponConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            redis_url,
            host,
            port,
            client_url,
            secure_cookies,
            access_token_secret,
            refresh_token_secret,
            stripe_secret_key,
            coupon,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CouponConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let threshold_minor_units = parse_env_or(
            "COUPON_THRESHOLD_MINOR_UNITS",
            defaults.threshold_minor_units,
        )?;
        let discount_percentage: u8 =
            parse_env_or("COUPON_DISCOUNT_PERCENTAGE", defaults.discount_percentage)?;
        if discount_percentage > 100 {
            return Err(ConfigError::InvalidEnvVar(
                "COUPON_DISCOUNT_PERCENTAGE".to_string(),
                "percentage must be 0-100".to_string(),
            ));
        }
        let validity_days = parse_env_or("COUPON_VALIDITY_DAYS", defaults.validity_days)?;

        Ok(Self {
            threshold_minor_units,
            discount_percentage,
            validity_days,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
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
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to a default when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Validate that a token signing secret is long enough and not a placeholder.
fn validate_token_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                secret.len()
            ),
        ));
    }

    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Load and validate a token signing secret from environment.
fn get_validated_token_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_token_secret(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_token_secret_too_short() {
        let result = validate_token_secret("short", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_token_secret_placeholder() {
        let result = validate_token_secret(&"changeme".repeat(5), "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_token_secret_valid() {
        let result = validate_token_secret("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%dE8", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_coupon_config_defaults() {
        let coupon = CouponConfig::default();
        assert_eq!(coupon.threshold_minor_units, 20_000);
        assert_eq!(coupon.discount_percentage, 10);
        assert_eq!(coupon.validity_days, 30);
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            redis_url: SecretString::from("redis://localhost"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            client_url: "http://localhost:5173".to_string(),
            secure_cookies: false,
            access_token_secret: SecretString::from("x".repeat(32)),
            refresh_token_secret: SecretString::from("y".repeat(32)),
            stripe_secret_key: SecretString::from("sk_test_123"),
            coupon: CouponConfig::default(),
            sentry_dsn: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
