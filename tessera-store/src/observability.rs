//! Tracing initialization

use tracing_subscriber::EnvFilter;

use crate::{config::StoreConfig, error::Result};

/// Initialize the global tracing subscriber
///
/// Uses JSON formatting with an environment filter derived from the
/// configured log level. Safe to call once per process; a second call
/// returns an error instead of panicking.
pub fn init_tracing(config: &StoreConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| crate::error::Error::Other(e.to_string()))?;

    tracing::info!("Tracing initialized");

    Ok(())
}
