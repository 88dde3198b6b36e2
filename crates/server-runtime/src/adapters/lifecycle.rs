//! # Session Lifecycle Adapters
//!
//! Listeners the runtime registers with the session manager so that state
//! keyed by session dies with the session.

use async_trait::async_trait;
use nc_01_keyed_lock::{KeyedLockManager, OwnerId};
use nc_03_session::{CloseReason, Session, SessionLifecycleListener};
use nc_telemetry::SESSIONS_TOTAL;
use shared_types::Datastore;
use std::sync::Arc;
use tracing::info;

/// Releases every datastore lock a closed session still held.
pub struct LockReleaseListener {
    locks: Arc<KeyedLockManager<Datastore>>,
}

impl LockReleaseListener {
    pub fn new(locks: Arc<KeyedLockManager<Datastore>>) -> Self {
        Self { locks }
    }
}

#[async_trait]
impl SessionLifecycleListener for LockReleaseListener {
    async fn session_closed(&self, session: &Session, reason: CloseReason) {
        let released = self.locks.release_all(OwnerId::Session(session.id()));
        if released > 0 {
            info!(
                session_id = %session.id(),
                released,
                %reason,
                "[Runtime] released datastore locks of closed session"
            );
        }
    }
}

/// Counts established and closed sessions.
#[derive(Debug, Default)]
pub struct SessionMetricsListener;

#[async_trait]
impl SessionLifecycleListener for SessionMetricsListener {
    async fn session_opened(&self, _session: &Arc<Session>) {
        SESSIONS_TOTAL.with_label_values(&["established"]).inc();
    }

    async fn session_closed(&self, _session: &Session, reason: CloseReason) {
        let outcome = match reason {
            CloseReason::Killed => "killed",
            CloseReason::Expired => "expired",
            _ => "closed",
        };
        SESSIONS_TOTAL.with_label_values(&[outcome]).inc();
    }
}
