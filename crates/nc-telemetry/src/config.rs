//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to log lines
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Whether the runtime should publish Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "netconf-server".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `NC_SERVICE_NAME`: Service name (default: netconf-server)
    /// - `NC_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `NC_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `NC_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `NC_METRICS_ENABLED`: Publish metrics (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("NC_SERVICE_NAME")
                .unwrap_or_else(|_| "netconf-server".to_string()),

            log_level: env::var("NC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("NC_CONSOLE_OUTPUT")
                .map(|v| flag(&v))
                .unwrap_or(true),

            json_logs: env::var("NC_JSON_LOGS")
                .map(|v| flag(&v))
                .unwrap_or(is_container),

            metrics_enabled: env::var("NC_METRICS_ENABLED")
                .map(|v| flag(&v))
                .unwrap_or(true),
        }
    }
}

fn flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
