//! Periodically copies the engine's atomic counters into Prometheus.

use crate::container::ServerContainer;
use nc_telemetry::{
    advance_counter, LOCK_TABLE_ENTRIES, NOTIFICATIONS_TOTAL, RPCS_TOTAL, SESSIONS_ACTIVE,
    SUBSCRIPTIONS_ACTIVE, TRANSACTIONS_TOTAL,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// One reporting pass.
pub fn publish_metrics(container: &ServerContainer) {
    SESSIONS_ACTIVE.set(container.sessions.len() as i64);
    LOCK_TABLE_ENTRIES.set(container.locks.len() as i64);
    SUBSCRIPTIONS_ACTIVE.set(container.notifications.subscription_count() as i64);

    let rpcs = container.router.metrics().snapshot();
    for (outcome, total) in [
        ("received", rpcs.received),
        ("responded", rpcs.responded),
        ("failed", rpcs.failed),
        ("not_supported", rpcs.not_supported),
        ("validation_failed", rpcs.validation_failed),
        ("panicked", rpcs.panicked),
    ] {
        advance_counter(&RPCS_TOTAL.with_label_values(&[outcome]), total);
    }

    let delivery = container.notifications.stats();
    for (outcome, total) in [
        ("published", delivery.published),
        ("delivered", delivery.delivered),
        ("dropped", delivery.dropped),
        ("queue_full", delivery.queue_full),
        ("evicted", delivery.evicted),
    ] {
        advance_counter(&NOTIFICATIONS_TOTAL.with_label_values(&[outcome]), total);
    }

    let transactions = container.coordinator.stats().snapshot();
    for (outcome, total) in [
        ("started", transactions.started),
        ("committed", transactions.committed),
        ("pre_commit_failed", transactions.pre_commit_failed),
        ("commit_failed", transactions.commit_failed),
        ("rolled_back", transactions.rolled_back),
    ] {
        advance_counter(&TRANSACTIONS_TOTAL.with_label_values(&[outcome]), total);
    }
}

/// Publish every `metrics.report_interval` until `shutdown` flips to true.
pub fn spawn_metrics_reporter(
    container: Arc<ServerContainer>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let period = container.config.metrics.report_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => publish_metrics(&container),
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        publish_metrics(&container);
        debug!("[Metrics] reporter stopped");
    })
}
