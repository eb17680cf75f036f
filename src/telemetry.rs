//! Tracing subscriber setup for binaries and tests embedding the store

use crate::config::LoggingConfig;
use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins over the configured directive
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| anyhow!("Invalid log filter '{}': {}", config.filter, e)),
    }
}

/// Install a global fmt subscriber
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config)?)
        .with_ansi(config.ansi)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))
}
