//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (prefix: TESSERA_)
//! 2. A TOML config file, when one is supplied
//! 3. Default values
//!
//! The store treats the connection string and shared database name as opaque
//! strings; they are owned by whatever process embeds the crate.

use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Store-level configuration
///
/// # Example
///
/// ```rust
/// use tessera_store::config::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.shared_database, "tessera");
/// assert_eq!(config.count_limit, 1_000_001);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Default connection string, used when a tenant supplies none and for
    /// all global collections
    #[serde(default = "default_connection")]
    pub default_connection: String,

    /// Database holding global (cross-tenant) collections
    #[serde(default = "default_shared_database")]
    pub shared_database: String,

    /// Bound on connection establishment and server selection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Safety bound applied to every filtered count
    #[serde(default = "default_count_limit")]
    pub count_limit: u64,

    /// Log level for the tracing subscriber (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_connection() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_shared_database() -> String {
    "tessera".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_count_limit() -> u64 {
    1_000_001
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_connection: default_connection(),
            shared_database: default_shared_database(),
            connect_timeout_secs: default_connect_timeout(),
            count_limit: default_count_limit(),
            log_level: default_log_level(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from the environment
    ///
    /// `TESSERA_`-prefixed environment variables override defaults, e.g.
    /// `TESSERA_DEFAULT_CONNECTION`, `TESSERA_SHARED_DATABASE`.
    pub fn load() -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(StoreConfig::default()))
            .merge(Env::prefixed("TESSERA_"))
            .extract()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    ///
    /// Environment variables still take priority over file contents.
    /// Useful for testing or non-standard deployments.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(StoreConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("TESSERA_"))
            .extract()?;
        Ok(config)
    }

    /// Connection establishment bound as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
