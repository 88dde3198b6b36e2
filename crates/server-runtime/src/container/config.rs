//! # Server Configuration
//!
//! Unified configuration for every engine component.
//!
//! Loaded from an optional TOML file named by `NC_CONFIG`, then overridden by
//! `NC_LISTEN_PORT` and `NC_WORKERS`. Every section has sane defaults.

use nc_02_authentication::UserEntry;
use nc_03_session::SessionConfig;
use nc_05_subsystem_coordinator::CoordinatorConfig;
use nc_06_notifications::NotificationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Complete server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listener: ListenerConfig,
    pub session: SessionConfig,
    pub router: RouterConfig,
    pub locks: LockConfig,
    pub coordinator: CoordinatorConfig,
    pub notifications: NotificationConfig,
    pub auth: AuthConfig,
    pub metrics: MetricsConfig,
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

impl ServerConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(document)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&document)
    }

    /// File named by `NC_CONFIG` (or defaults), then environment overrides,
    /// then validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os("NC_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `NC_LISTEN_PORT` and `NC_WORKERS` from `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("NC_LISTEN_PORT") {
            self.listener.port = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "NC_LISTEN_PORT",
                value,
            })?;
        }
        if let Some(value) = lookup("NC_WORKERS") {
            self.router.workers = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "NC_WORKERS",
                value,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router.workers == 0 {
            return Err(ConfigError::Invalid("router.workers must be at least 1".into()));
        }
        if self.session.outbound_queue == 0 {
            return Err(ConfigError::Invalid("session.outbound_queue must be at least 1".into()));
        }
        if self.session.hello_timeout.is_zero() {
            return Err(ConfigError::Invalid("session.hello_timeout must be positive".into()));
        }
        if !self
            .session
            .capabilities
            .iter()
            .any(|c| shared_types::Capability::is_base(c))
        {
            return Err(ConfigError::Invalid(
                "session.capabilities must include a base capability".into(),
            ));
        }
        if self.notifications.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notifications.queue_capacity must be at least 1".into(),
            ));
        }
        if self.listener.max_frame_bytes < 1024 {
            return Err(ConfigError::Invalid(
                "listener.max_frame_bytes must be at least 1024".into(),
            ));
        }
        if self.locks.acquire_timeout.is_zero() {
            return Err(ConfigError::Invalid("locks.acquire_timeout must be positive".into()));
        }
        Ok(())
    }
}

/// TCP listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub host: String,
    /// Zero picks an ephemeral port.
    pub port: u16,
    /// Largest accepted inbound frame.
    pub max_frame_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 830,
            max_frame_bytes: 4 * 1024 * 1024,
        }
    }
}

impl ListenerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// RPC dispatch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Handlers executing at once across all sessions.
    pub workers: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { workers: 64 }
    }
}

/// Keyed lock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// How long `edit-config` waits for its datastore critical section.
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Static user database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub users: Vec<UserEntry>,
}

/// Metrics publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(15),
        }
    }
}
