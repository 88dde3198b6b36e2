//! Dispatch counters. Lock-free; the runtime copies them into Prometheus.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RouterMetrics {
    pub received: AtomicU64,
    pub responded: AtomicU64,
    pub failed: AtomicU64,
    pub not_supported: AtomicU64,
    pub validation_failed: AtomicU64,
    pub panicked: AtomicU64,
}

/// Point-in-time copy of `RouterMetrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterMetricsSnapshot {
    pub received: u64,
    pub responded: u64,
    pub failed: u64,
    pub not_supported: u64,
    pub validation_failed: u64,
    pub panicked: u64,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_responded(&self) {
        self.responded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_supported(&self) {
        self.not_supported.fetch_add(1, Ordering::Relaxed);
        self.record_failed();
    }

    pub fn record_validation_failed(&self) {
        self.validation_failed.fetch_add(1, Ordering::Relaxed);
        self.record_failed();
    }

    pub fn record_panic(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
        self.record_failed();
    }

    pub fn snapshot(&self) -> RouterMetricsSnapshot {
        RouterMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            responded: self.responded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            not_supported: self.not_supported.load(Ordering::Relaxed),
            validation_failed: self.validation_failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}
