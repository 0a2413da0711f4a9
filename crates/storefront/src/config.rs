//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `NATURE_API_URL` - Marketplace backend base URL (default: `http://localhost:8000`)
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_STATIC_DIR` - Built web bundle served by the edge server
//! - `STOREFRONT_DATA_DIR` - Directory for persisted client state (default: in-memory)
//! - `STOREFRONT_DEFAULT_LOCALE` - Fallback language code (default: es)
//! - `ACCESS_COOKIE_MAX_AGE_SECS` - Lifetime of the access-token cookie (default: 3600)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Performance trace sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use nature_core::Locale;
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_ACCESS_COOKIE_MAX_AGE_SECS: u64 = 60 * 60;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Marketplace backend base URL (scheme + host, no `/api` suffix)
    pub api_url: Url,
    /// IP address to bind the edge server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Directory holding the built web bundle
    pub static_dir: PathBuf,
    /// Directory for persisted client state; `None` keeps state in memory
    pub data_dir: Option<PathBuf>,
    /// Language used when no preference is stored or detected
    pub default_locale: Locale,
    /// How long the access-token cookie mirror lives
    pub access_cookie_max_age: Duration,
    /// Sentry configuration
    pub sentry: SentryConfig,
}

/// Sentry error tracking configuration.
#[derive(Debug, Clone)]
pub struct SentryConfig {
    /// DSN; tracking is disabled when absent
    pub dsn: Option<String>,
    /// Environment tag (e.g. "production")
    pub environment: Option<String>,
    /// Fraction of errors sent
    pub sample_rate: f32,
    /// Fraction of transactions traced
    pub traces_sample_rate: f32,
}

impl Default for SentryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
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
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_env("NATURE_API_URL", DEFAULT_API_URL, Url::parse)?;
        let host = parse_env("STOREFRONT_HOST", "127.0.0.1", str::parse::<IpAddr>)?;
        let port = parse_env("STOREFRONT_PORT", "3000", str::parse::<u16>)?;
        let static_dir = PathBuf::from(get_env_or_default(
            "STOREFRONT_STATIC_DIR",
            "crates/storefront/static",
        ));
        let data_dir = get_optional_env("STOREFRONT_DATA_DIR").map(PathBuf::from);
        let default_locale = parse_env("STOREFRONT_DEFAULT_LOCALE", "es", str::parse::<Locale>)?;
        let max_age = parse_env(
            "ACCESS_COOKIE_MAX_AGE_SECS",
            &DEFAULT_ACCESS_COOKIE_MAX_AGE_SECS.to_string(),
            str::parse::<u64>,
        )?;

        let sentry = SentryConfig {
            dsn: get_optional_env("SENTRY_DSN"),
            environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0", str::parse::<f32>)?,
            traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.0", str::parse::<f32>)?,
        };

        Ok(Self {
            api_url,
            host,
            port,
            static_dir,
            data_dir,
            default_locale,
            access_cookie_max_age: Duration::from_secs(max_age),
            sentry,
        })
    }

    /// Configuration pointing at a specific backend with every other value defaulted.
    ///
    /// Used when embedding the client state layer and in tests.
    #[must_use]
    pub fn for_api(api_url: Url) -> Self {
        Self {
            api_url,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            static_dir: PathBuf::from("crates/storefront/static"),
            data_dir: None,
            default_locale: Locale::default(),
            access_cookie_max_age: Duration::from_secs(DEFAULT_ACCESS_COOKIE_MAX_AGE_SECS),
            sentry: SentryConfig::default(),
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating an empty value as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Read and parse an environment variable, falling back to `default`.
fn parse_env<T, E, F>(key: &str, default: &str, parse: F) -> Result<T, ConfigError>
where
    E: std::fmt::Display,
    F: FnOnce(&str) -> Result<T, E>,
{
    let raw = get_env_or_default(key, default);
    parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
