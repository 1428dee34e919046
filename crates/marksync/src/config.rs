//! Client configuration.

use std::path::PathBuf;

use marksync_sync::{Environment, SyncConfig};

use crate::error::{ClientError, Result};

/// Selects [`Environment`]: `development` / `dev` or `production` / `prod`.
pub const ENV_ENVIRONMENT: &str = "MARKSYNC_ENV";
/// Overrides the environment's server URL.
pub const ENV_SERVER_URL: &str = "MARKSYNC_SERVER_URL";
/// Path of the SQLite database.
pub const ENV_DATABASE: &str = "MARKSYNC_DB";
/// `tracing` filter directive, e.g. `marksync_sync=debug,info`.
pub const ENV_LOG: &str = "MARKSYNC_LOG";

/// Default database file name.
pub const DEFAULT_DATABASE: &str = "marksync.db";

/// Configuration for [`BookmarkSync`](crate::BookmarkSync).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub environment: Environment,
    pub database_path: PathBuf,
    pub sync: SyncConfig,
    /// Filter used by [`init_tracing`](crate::init_tracing).
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

impl ClientConfig {
    /// Defaults for `environment`.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            database_path: PathBuf::from(DEFAULT_DATABASE),
            sync: SyncConfig::for_environment(environment),
            log_filter: environment.default_log_filter().to_string(),
        }
    }

    /// Read configuration from the process environment.
    ///
    /// Unset variables fall back to the defaults of the selected
    /// environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup(ENV_ENVIRONMENT) {
            Some(value) => value
                .parse::<Environment>()
                .map_err(|e| ClientError::Config(format!("{}: {}", ENV_ENVIRONMENT, e)))?,
            None => Environment::default(),
        };

        let mut config = Self::for_environment(environment);
        if let Some(url) = lookup(ENV_SERVER_URL).filter(|v| !v.trim().is_empty()) {
            config.sync = config.sync.with_server_url(url.trim());
        }
        if let Some(path) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            config.log_filter = filter;
        }
        Ok(config)
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }
}
