//! Tracing setup.

use tracing_subscriber::EnvFilter;

use crate::config::ClientConfig;

/// Install a formatting subscriber filtered by `config.log_filter`.
///
/// An unparseable filter falls back to the environment's default level.
/// Does nothing if a global subscriber is already set.
pub fn init_tracing(config: &ClientConfig) {
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(config.environment.default_log_filter()));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
    {
        tracing::debug!(environment = ?config.environment, "tracing initialized");
    }
}
