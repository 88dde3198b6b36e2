//! # NETCONF Telemetry
//!
//! Structured logging and Prometheus metrics for the server.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nc_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! let _guard = init_telemetry(config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NC_SERVICE_NAME` | `netconf-server` | Service name in logs |
//! | `NC_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `NC_JSON_LOGS` | `false` | JSON log lines |
//! | `NC_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `NC_METRICS_ENABLED` | `true` | Publish metrics |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use metrics::{
    advance_counter, gather_metrics, register_metrics, LOCK_TABLE_ENTRIES, NOTIFICATIONS_TOTAL,
    RPCS_TOTAL, SESSIONS_ACTIVE, SESSIONS_TOTAL, SUBSCRIPTIONS_ACTIVE, TRANSACTIONS_TOTAL,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Install logging and register metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    if config.metrics_enabled {
        register_metrics()?;
    }
    logging::init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "[Telemetry] initialized"
    );
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "[Telemetry] shutting down");
    }
}
