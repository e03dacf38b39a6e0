//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `KIRANA_BACKEND_URL` - Base URL of the REST backend (e.g., `https://api.example.in/`)
//! - `RAZORPAY_KEY_ID` - Public gateway key handed to the hosted payment UI
//!
//! ## Optional
//! - `KIRANA_API_TOKEN` - Service bearer token for the backend (high entropy)
//! - `BACKEND_TIMEOUT_MS` - Per-request backend timeout (default: 10000)
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `RAZORPAY_CHECKOUT_SCRIPT_URL` - Gateway checkout script
//! - `CHECKOUT_CURRENCY` - ISO 4217 code (default: INR)
//! - `CHECKOUT_DISPLAY_NAME` / `CHECKOUT_DESCRIPTION` / `CHECKOUT_IMAGE_URL`
//! - `CHECKOUT_THEME_COLOR` - Hosted UI accent color (default: #3399cc)
//! - `CHECKOUT_PAYMENT_PAGE` - Direct-navigation payment page (default: /checkout/payment)
//! - `CHECKOUT_CONFIRMATION_PAGE` - Page shown after success (default: /order-confirmation)
//! - `CHECKOUT_HOSTED_TIMEOUT_SECS` - Give up on an untouched payment window (default: never)
//! - `CHECKOUT_SESSION_TTL_SECS` - Idle lifetime of a checkout session (default: 3600)
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` - Sentry error tracking

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use kirana_core::CurrencyCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_SCRIPT_URL: &str = "https://checkout.razorpay.com/v1/checkout.js";

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
    "put-your",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// REST backend connection
    pub backend: BackendConfig,
    /// Payment gateway (hosted UI) settings
    pub gateway: GatewayConfig,
    /// Checkout presentation and flow settings
    pub checkout: CheckoutConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag (e.g., "production")
    pub sentry_environment: Option<String>,
}

/// REST backend connection settings.
///
/// Implements `Debug` manually to redact the service token.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL; endpoint paths are joined relative to it.
    pub base_url: Url,
    /// Service-level bearer token, used when a request carries no shopper token.
    pub api_token: Option<SecretString>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Hosted payment gateway settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Public key id passed to the hosted UI (not a secret).
    pub key_id: String,
    /// Location of the gateway's checkout script.
    pub script_url: Url,
}

/// Checkout flow settings.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub currency: CurrencyCode,
    /// Merchant name shown in the hosted UI.
    pub display_name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub theme_color: String,
    /// Page that can start payment for an already placed order.
    pub payment_page: String,
    /// Page the shopper lands on after acknowledging a successful payment.
    pub confirmation_page: String,
    /// `None` waits for the shopper indefinitely.
    pub hosted_timeout: Option<Duration>,
    pub session_ttl: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::INR,
            display_name: "Kirana".to_string(),
            description: "Order payment".to_string(),
            image_url: None,
            theme_color: "#3399cc".to_string(),
            payment_page: "/checkout/payment".to_string(),
            confirmation_page: "/order-confirmation".to_string(),
            hosted_timeout: None,
            session_ttl: Duration::from_secs(3600),
        }
    }
}

impl StorefrontConfig {
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

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;

        Ok(Self {
            host,
            port,
            backend: BackendConfig::from_env()?,
            gateway: GatewayConfig::from_env()?,
            checkout: CheckoutConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl BackendConfig {
    /// Load the backend connection settings on their own.
    ///
    /// Used by the CLI, which needs the backend but none of the server settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL is missing or malformed, or the token
    /// looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let base_url = parse_base_url(&get_required_env("KIRANA_BACKEND_URL")?)
            .map_err(|e| ConfigError::InvalidEnvVar("KIRANA_BACKEND_URL".to_string(), e))?;
        let api_token = get_optional_env("KIRANA_API_TOKEN")
            .map(|token| {
                validate_secret_strength(&token, "KIRANA_API_TOKEN")?;
                Ok::<_, ConfigError>(SecretString::from(token))
            })
            .transpose()?;
        let timeout_ms: u64 = parse_env("BACKEND_TIMEOUT_MS", "10000")?;

        Ok(Self {
            base_url,
            api_token,
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Settings for a backend at `base_url` with no service token.
    ///
    /// # Errors
    ///
    /// Returns a message if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, String> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_token: None,
            timeout: Duration::from_secs(10),
        })
    }

    /// Whether a service token is configured.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.api_token
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let script_url = get_env_or_default("RAZORPAY_CHECKOUT_SCRIPT_URL", DEFAULT_SCRIPT_URL);
        Ok(Self {
            key_id: get_required_env("RAZORPAY_KEY_ID")?,
            script_url: Url::parse(&script_url).map_err(|e| {
                ConfigError::InvalidEnvVar("RAZORPAY_CHECKOUT_SCRIPT_URL".to_string(), e.to_string())
            })?,
        })
    }
}

impl CheckoutConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let hosted_timeout = get_optional_env("CHECKOUT_HOSTED_TIMEOUT_SECS")
            .map(|v| {
                v.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "CHECKOUT_HOSTED_TIMEOUT_SECS".to_string(),
                        e.to_string(),
                    )
                })
            })
            .transpose()?;
        let session_ttl_secs: u64 = parse_env("CHECKOUT_SESSION_TTL_SECS", "3600")?;

        Ok(Self {
            currency: parse_env("CHECKOUT_CURRENCY", "INR")?,
            display_name: get_env_or_default("CHECKOUT_DISPLAY_NAME", &defaults.display_name),
            description: get_env_or_default("CHECKOUT_DESCRIPTION", &defaults.description),
            image_url: get_optional_env("CHECKOUT_IMAGE_URL"),
            theme_color: get_env_or_default("CHECKOUT_THEME_COLOR", &defaults.theme_color),
            payment_page: get_env_or_default("CHECKOUT_PAYMENT_PAGE", &defaults.payment_page),
            confirmation_page: get_env_or_default(
                "CHECKOUT_CONFIRMATION_PAGE",
                &defaults.confirmation_page,
            ),
            hosted_timeout,
            session_ttl: Duration::from_secs(session_ttl_secs),
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

/// Get an optional environment variable, treating empty as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a base URL and make sure relative joins keep its path.
fn parse_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme: {}", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated token."
            ),
        ));
    }

    Ok(())
}
