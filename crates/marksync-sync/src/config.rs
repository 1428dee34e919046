//! Sync configuration.

use std::str::FromStr;
use std::time::Duration;

/// Default path of the sync endpoint, relative to the server URL.
pub const DEFAULT_SYNC_PATH: &str = "/api/bookmarks/sync";

/// Deployment environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Server URL used when none is configured.
    pub fn default_server_url(self) -> &'static str {
        match self {
            Environment::Development => "http://localhost:8080",
            Environment::Production => "https://smartbookmarks.cloud",
        }
    }

    /// `tracing` filter directive used when none is configured.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            Environment::Development => "debug",
            Environment::Production => "info",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

/// Configuration for sync behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Base URL of the sync server.
    pub server_url: String,
    /// Path of the sync endpoint.
    pub sync_path: String,
    /// Timeout for one HTTP exchange.
    pub request_timeout: Duration,
    /// Capacity of the sync event channel.
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

impl SyncConfig {
    /// Defaults for `environment`.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            server_url: environment.default_server_url().to_string(),
            sync_path: DEFAULT_SYNC_PATH.to_string(),
            request_timeout: Duration::from_secs(30),
            event_capacity: 64,
        }
    }

    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    pub fn with_sync_path(mut self, sync_path: impl Into<String>) -> Self {
        self.sync_path = sync_path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Full URL of the sync endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.trim_end_matches('/'),
            self.sync_path.trim_start_matches('/')
        )
    }
}
