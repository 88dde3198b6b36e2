//! Prometheus metrics for the NETCONF server.
//!
//! All metrics follow the naming convention: `nc_<area>_<metric>`
//!
//! Core crates count with plain atomics. The runtime copies their running
//! totals in here with `advance_counter`, so the counters stay monotonic.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Crate-owned metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // SESSION METRICS
    // =========================================================================

    /// Sessions currently established
    pub static ref SESSIONS_ACTIVE: IntGauge = IntGauge::new(
        "nc_sessions_active",
        "Number of established NETCONF sessions"
    ).expect("metric creation failed");

    /// Session handshakes by outcome
    pub static ref SESSIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("nc_sessions_total", "Session handshakes by outcome"),
        &["outcome"]  // established, rejected
    ).expect("metric creation failed");

    // =========================================================================
    // RPC METRICS
    // =========================================================================

    /// RPCs by outcome
    pub static ref RPCS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("nc_rpcs_total", "RPCs by outcome"),
        &["outcome"]  // received, responded, failed, not_supported, validation_failed, panicked
    ).expect("metric creation failed");

    // =========================================================================
    // LOCK METRICS
    // =========================================================================

    /// Keys currently held
    pub static ref LOCK_TABLE_ENTRIES: IntGauge = IntGauge::new(
        "nc_lock_table_entries",
        "Number of records in the keyed lock table"
    ).expect("metric creation failed");

    // =========================================================================
    // NOTIFICATION METRICS
    // =========================================================================

    /// Subscriptions currently registered
    pub static ref SUBSCRIPTIONS_ACTIVE: IntGauge = IntGauge::new(
        "nc_subscriptions_active",
        "Number of active notification subscriptions"
    ).expect("metric creation failed");

    /// Notifications by outcome
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("nc_notifications_total", "Notifications by outcome"),
        &["outcome"]  // published, delivered, dropped, queue_full, evicted
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSACTION METRICS
    // =========================================================================

    /// Configuration transactions by outcome
    pub static ref TRANSACTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("nc_transactions_total", "Configuration transactions by outcome"),
        &["outcome"]  // started, committed, pre_commit_failed, commit_failed, rolled_back
    ).expect("metric creation failed");
}

/// Register all metrics with the crate registry. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SESSIONS_ACTIVE.clone()),
        Box::new(SESSIONS_TOTAL.clone()),
        Box::new(RPCS_TOTAL.clone()),
        Box::new(LOCK_TABLE_ENTRIES.clone()),
        Box::new(SUBSCRIPTIONS_ACTIVE.clone()),
        Box::new(NOTIFICATIONS_TOTAL.clone()),
        Box::new(TRANSACTIONS_TOTAL.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Raise `counter` to `total`. Never lowers it.
pub fn advance_counter(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
