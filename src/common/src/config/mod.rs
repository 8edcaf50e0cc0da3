use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Relational store configuration (profiles, sessions, enrollments, audit,
/// subscription mirror)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("sqlite://.data/gatherly.db"),
        }
    }
}

impl DatabaseConfig {
    /// In-memory database configuration for tests and local smoke runs
    pub fn in_memory() -> Self {
        Self {
            dsn: String::from("sqlite::memory:"),
        }
    }
}

/// Object storage configuration for user-generated media
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub dsn: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("file://.data/media"),
        }
    }
}

impl StorageConfig {
    /// In-memory object store configuration for tests
    pub fn in_memory() -> Self {
        Self {
            dsn: String::from("memory://"),
        }
    }
}

/// Identity provider (admin API) configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Base URL of the identity provider's HTTP API
    pub base_url: String,
    /// Service-role key used for admin endpoints (user lookup / deletion)
    pub service_key: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Attempts per call before giving up on transient failures
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://127.0.0.1:9999"),
            service_key: String::new(),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(250),
        }
    }
}

/// Billing provider configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Base URL of the billing provider's HTTP API
    pub base_url: String,
    /// Secret API key
    pub secret_key: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Attempts per call before giving up on transient failures
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.stripe.com"),
            secret_key: String::new(),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(250),
        }
    }
}

/// A bearer token defined directly in configuration, mapped to a fixed
/// account. Used for local development and integration tests; production
/// tokens are verified against the identity provider instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticTokenConfig {
    pub token: String,
    pub account_id: Uuid,
    pub email: String,
}

/// Authentication configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    pub static_tokens: Vec<StaticTokenConfig>,
}

/// HTTP server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: String::from("0.0.0.0:3000"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Relational store for account data
    pub database: DatabaseConfig,
    /// Object storage for user-generated media
    pub storage: StorageConfig,
    /// Identity provider admin API
    pub identity: IdentityConfig,
    /// Billing provider API
    pub billing: BillingConfig,
    /// Bearer-token authentication
    pub auth: AuthConfig,
    /// HTTP server
    pub server: ServerConfig,
}

impl Configuration {
    /// Load configuration from defaults, `gatherly.toml`, and `GATHERLY__`
    /// environment variables (double underscore separates nesting levels).
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file("gatherly.toml"))
            .merge(Env::prefixed("GATHERLY__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Load configuration from an explicit TOML file instead of the default
    /// search path. Environment variables still take precedence.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("GATHERLY__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }
}
