//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CLEMENTINE_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to the generic `DATABASE_URL`)
//! - `JWT_ACCESS_SECRET` - Access token signing secret (min 32 chars, high entropy)
//! - `JWT_REFRESH_SECRET` - Refresh token signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `CLEMENTINE_HOST` - Bind address (default: 127.0.0.1)
//! - `CLEMENTINE_PORT` - Listen port (default: 4000)
//! - `JWT_ACCESS_TTL_SECS` - Access token lifetime (default: 900)
//! - `JWT_REFRESH_TTL_SECS` - Refresh token lifetime (default: 604800)
//! - `CORS_ALLOWED_ORIGIN` - Browser origin allowed by CORS
//! - `SMTP_HOST` / `SMTP_PORT` / `SMTP_USERNAME` / `SMTP_PASSWORD` /
//!   `SMTP_FROM_ADDRESS` / `ALERTS_ADDRESS` - Email delivery (disabled when
//!   `SMTP_HOST` is unset)
//! - `STRIPE_SECRET_KEY` - Stripe gateway (disabled when unset)
//! - `RAZORPAY_KEY_ID` / `RAZORPAY_KEY_SECRET` - Razorpay gateway (disabled
//!   when either is unset)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive).
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "fixme",
    "insert",
    "enter-",
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

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Token signing configuration
    pub jwt: JwtConfig,
    /// SMTP delivery; `None` disables outbound email
    pub smtp: Option<SmtpConfig>,
    /// Stripe gateway; `None` disables Stripe payments
    pub stripe: Option<StripeConfig>,
    /// Razorpay gateway; `None` disables Razorpay payments
    pub razorpay: Option<RazorpayConfig>,
    /// Browser origin allowed by CORS, if any
    pub cors_allowed_origin: Option<String>,
}

/// JWT signing secrets and lifetimes.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Access token signing secret
    pub access_secret: SecretString,
    /// Refresh token signing secret
    pub refresh_secret: SecretString,
    /// Access token lifetime (~15 minutes)
    pub access_ttl: Duration,
    /// Refresh token lifetime (~7 days); also the session row expiry
    pub refresh_ttl: Duration,
}

/// SMTP delivery configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Sender address for all outbound mail
    pub from_address: String,
    /// Back-office address for new-order and low-stock alerts
    pub alerts_address: Option<String>,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("alerts_address", &self.alerts_address)
            .finish()
    }
}

/// Stripe gateway credentials.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
}

/// Razorpay gateway credentials.
#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: SecretString,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from a `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CLEMENTINE_DATABASE_URL")?;
        let host = get_env_or_default("CLEMENTINE_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CLEMENTINE_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("CLEMENTINE_PORT", "4000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CLEMENTINE_PORT".to_string(), e.to_string())
            })?;

        let jwt = JwtConfig::from_env()?;
        let smtp = SmtpConfig::from_env()?;
        let stripe = StripeConfig::from_env();
        let razorpay = RazorpayConfig::from_env();
        let cors_allowed_origin = get_optional_env("CORS_ALLOWED_ORIGIN");

        Ok(Self {
            database_url,
            host,
            port,
            jwt,
            smtp,
            stripe,
            razorpay,
            cors_allowed_origin,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let access_secret = get_validated_secret("JWT_ACCESS_SECRET")?;
        let refresh_secret = get_validated_secret("JWT_REFRESH_SECRET")?;
        validate_secret_length(&access_secret, "JWT_ACCESS_SECRET")?;
        validate_secret_length(&refresh_secret, "JWT_REFRESH_SECRET")?;

        let access_ttl = get_duration_secs("JWT_ACCESS_TTL_SECS", 15 * 60)?;
        let refresh_ttl = get_duration_secs("JWT_REFRESH_TTL_SECS", 7 * 24 * 60 * 60)?;

        Ok(Self {
            access_secret,
            refresh_secret,
            access_ttl,
            refresh_ttl,
        })
    }
}

impl SmtpConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        let port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Some(Self {
            host,
            port,
            username: get_required_env("SMTP_USERNAME")?,
            password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM_ADDRESS")?,
            alerts_address: get_optional_env("ALERTS_ADDRESS"),
        }))
    }
}

impl StripeConfig {
    fn from_env() -> Option<Self> {
        let secret_key = get_optional_env("STRIPE_SECRET_KEY")?;
        Some(Self {
            secret_key: SecretString::from(secret_key),
        })
    }
}

impl RazorpayConfig {
    fn from_env() -> Option<Self> {
        let key_id = get_optional_env("RAZORPAY_KEY_ID")?;
        let key_secret = get_optional_env("RAZORPAY_KEY_SECRET")?;
        Some(Self {
            key_id,
            key_secret: SecretString::from(key_secret),
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

/// Get a duration in whole seconds with a default.
fn get_duration_secs(key: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
            #[allow(clippy::cast_precision_loss)] // Count will never exceed f64 precision
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
    fn test_shannon_entropy_uniform_string_is_zero() {
        assert!((shannon_entropy("aaaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_random_string_is_high() {
        assert!(shannon_entropy("qZ8#mV2$kT6!wR4@xP9^") > 3.3);
    }

    #[test]
    fn test_placeholder_secrets_rejected() {
        assert!(validate_secret_strength("your-signing-key-here", "VAR").is_err());
        assert!(validate_secret_strength("changeme-changeme-42", "VAR").is_err());
    }

    #[test]
    fn test_low_entropy_secret_rejected() {
        let result = validate_secret_strength(&"ab".repeat(20), "VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_strong_secret_accepted() {
        assert!(validate_secret_strength("qZ8#mV2$kT6!wR4@xP9^nL3&jD7*fH1%", "VAR").is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let secret = SecretString::from("short");
        assert!(validate_secret_length(&secret, "VAR").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/clementine"),
            host: "0.0.0.0".parse().unwrap(),
            port: 4000,
            jwt: JwtConfig {
                access_secret: SecretString::from("a".repeat(32)),
                refresh_secret: SecretString::from("b".repeat(32)),
                access_ttl: Duration::from_secs(900),
                refresh_ttl: Duration::from_secs(604_800),
            },
            smtp: None,
            stripe: None,
            razorpay: None,
            cors_allowed_origin: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "0.0.0.0");
        assert_eq!(addr.port(), 4000);
    }

    #[test]
    fn test_smtp_config_debug_redacts_password() {
        let config = SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: SecretString::from("very-hidden-password"),
            from_address: "orders@clementine.store".to_string(),
            alerts_address: None,
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("very-hidden-password"));
    }
}
