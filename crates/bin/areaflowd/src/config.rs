//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `areaflow.toml` in the working directory (or the path in
//! `AREAFLOW_CONFIG`). Every field has a default so the file is optional.
//! Environment variables take precedence over file values.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use areaflow_app::services::execution_service::TimeoutPolicy;
use areaflow_domain::retry::RetryPolicy;

const DEFAULT_CONFIG_PATH: &str = "areaflow.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerConfig,
    pub executions: ExecutionsConfig,
    pub event_bus: EventBusConfig,
    pub dedup: DedupConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Activation timers. Only one running daemon may have them enabled.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
}

/// Timeout sweep and retry settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExecutionsConfig {
    /// `RUNNING` executions older than this are considered lost.
    pub timeout_secs: u64,
    /// Period of the maintenance loop.
    pub sweep_interval_secs: u64,
    pub timeout_policy: TimeoutAction,
    pub retry: RetryPolicy,
}

/// Serialized form of [`TimeoutPolicy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutAction {
    #[default]
    Retry,
    Fail,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Broadcast channel capacity; slow subscribers past it lose events.
    pub capacity: usize,
}

/// Dedup window overrides, in seconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub default_ttl_secs: Option<u64>,
    /// Per-provider TTL, keyed by provider name.
    pub providers: BTreeMap<String, u64>,
}

impl Config {
    /// Load configuration from `areaflow.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("AREAFLOW_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply `AREAFLOW_*` overrides read through `lookup`.
    ///
    /// `AREAFLOW_BIND` wins over host and port; `RUST_LOG` wins over
    /// `AREAFLOW_LOG`. Unparseable numbers are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("AREAFLOW_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("AREAFLOW_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some((host, port)) = lookup("AREAFLOW_BIND")
            .as_deref()
            .and_then(|bind| bind.rsplit_once(':'))
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(url) = lookup("AREAFLOW_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(filter) = lookup("RUST_LOG").or_else(|| lookup("AREAFLOW_LOG")) {
            self.logging.filter = filter;
        }
        if let Some(enabled) = lookup("AREAFLOW_SCHEDULER").and_then(|v| v.parse().ok()) {
            self.scheduler.enabled = enabled;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be non-zero".to_string(),
            ));
        }
        if self.executions.timeout_secs == 0 || self.executions.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "execution timeout and sweep interval must be non-zero".to_string(),
            ));
        }
        if self.event_bus.capacity == 0 {
            return Err(ConfigError::Validation(
                "event_bus.capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ExecutionsConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl From<TimeoutAction> for TimeoutPolicy {
    fn from(action: TimeoutAction) -> Self {
        match action {
            TimeoutAction::Retry => Self::Retry,
            TimeoutAction::Fail => Self::Fail,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:areaflow.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "areaflowd=info,areaflow=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for ExecutionsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            sweep_interval_secs: 30,
            timeout_policy: TimeoutAction::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Validation(String),
}
