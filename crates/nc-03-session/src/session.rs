//! # Session
//!
//! One authenticated, capability-negotiated management conversation. The
//! negotiated capability set is fixed at construction. The session exclusively
//! owns its outbound channel; everyone else holds clones of the handle.

use crate::channel::{wait_closing, SessionChannel};
use chrono::{DateTime, Utc};
use shared_types::{CapabilitySet, Endpoints, Identity, SessionId};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client sent `close-session`.
    ClientRequest,
    /// Another session issued `kill-session`.
    Killed,
    /// The transport failed or reached end of stream.
    TransportFailure,
    /// The authentication gateway expired the session.
    Expired,
    /// The server is shutting down.
    ServerShutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ClientRequest => "close-session",
            Self::Killed => "killed",
            Self::TransportFailure => "transport failure",
            Self::Expired => "expired",
            Self::ServerShutdown => "server shutdown",
        };
        f.write_str(text)
    }
}

pub struct Session {
    id: SessionId,
    identity: Identity,
    capabilities: CapabilitySet,
    endpoints: Endpoints,
    transport: &'static str,
    established_at: DateTime<Utc>,
    channel: SessionChannel,
    draining: AtomicBool,
    in_flight: watch::Sender<usize>,
    next_sequence: AtomicU64,
}

impl Session {
    pub(crate) fn new(
        identity: Identity,
        capabilities: CapabilitySet,
        endpoints: Endpoints,
        transport: &'static str,
        channel: SessionChannel,
    ) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            id: channel.session_id(),
            identity,
            capabilities,
            endpoints,
            transport,
            established_at: Utc::now(),
            channel,
            draining: AtomicBool::new(false),
            in_flight,
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn endpoints(&self) -> Endpoints {
        self.endpoints
    }

    pub fn transport(&self) -> &'static str {
        self.transport
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    pub fn channel(&self) -> &SessionChannel {
        &self.channel
    }

    /// Arrival sequence number for the next request.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }

    /// Whether new requests should still be read.
    pub fn is_accepting(&self) -> bool {
        !self.draining.load(Ordering::Acquire) && !self.channel.is_closed()
    }

    pub fn is_closing(&self) -> bool {
        self.channel.is_closed()
    }

    /// Resolve once the session starts closing.
    pub async fn closing(&self) {
        let mut rx = self.channel.closing_signal();
        wait_closing(&mut rx).await;
    }

    /// Count a request as in flight until the guard drops.
    pub fn begin_request(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.send_modify(|n| *n += 1);
        InFlightGuard {
            session: Arc::clone(self),
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.borrow()
    }

    /// Stop reading new requests and wait for in-flight ones, up to `grace`.
    ///
    /// Returns `false` if the grace period elapsed first.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.draining.store(true, Ordering::Release);
        let mut rx = self.in_flight.subscribe();
        let drained = async move {
            loop {
                if *rx.borrow_and_update() == 0 {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::time::timeout(grace, drained).await.is_ok()
    }

    pub(crate) fn begin_close(&self) -> bool {
        self.draining.store(true, Ordering::Release);
        self.channel.close()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("transport", &self.transport)
            .field("capabilities", &self.capabilities.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Marks one request as in flight on a session.
#[derive(Debug)]
pub struct InFlightGuard {
    session: Arc<Session>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.session
            .in_flight
            .send_modify(|n| *n = n.saturating_sub(1));
    }
}
