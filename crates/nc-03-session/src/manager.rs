//! # Session Manager
//!
//! Owns the table of live sessions. It turns an accepted transport connection
//! into a `Session` (authenticate, allocate id, exchange hellos, negotiate
//! capabilities, start the writer) and tears sessions down exactly once,
//! telling every registered `SessionLifecycleListener`.

use crate::channel::{run_writer, SessionChannel};
use crate::config::SessionConfig;
use crate::errors::SessionError;
use crate::session::{CloseReason, Session};
use crate::transport::{FrameReader, TransportConnection, TransportError};
use async_trait::async_trait;
use dashmap::DashMap;
use nc_02_authentication::{AuthenticationGateway, SessionExpiryListener};
use parking_lot::RwLock;
use shared_types::{CapabilitySet, Credentials, SessionId, SessionIdAllocator, WireMessage};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hooks into session creation and destruction.
///
/// `session_closed` is called exactly once per established session.
#[async_trait]
pub trait SessionLifecycleListener: Send + Sync {
    async fn session_opened(&self, _session: &Arc<Session>) {}

    async fn session_closed(&self, session: &Session, reason: CloseReason);
}

/// A session that completed its handshake, plus the inbound half of its
/// transport for the caller's read loop.
pub struct EstablishedSession {
    pub session: Arc<Session>,
    pub reader: Box<dyn FrameReader>,
}

pub struct SessionManager {
    config: SessionConfig,
    server_capabilities: CapabilitySet,
    auth: Arc<dyn AuthenticationGateway>,
    ids: SessionIdAllocator,
    sessions: DashMap<SessionId, Arc<Session>>,
    listeners: RwLock<Vec<Arc<dyn SessionLifecycleListener>>>,
    weak_self: Weak<SessionManager>,
}

impl SessionManager {
    pub fn new(config: SessionConfig, auth: Arc<dyn AuthenticationGateway>) -> Arc<Self> {
        let server_capabilities = config.server_capabilities();
        Arc::new_cyclic(|weak_self| Self {
            config,
            server_capabilities,
            auth,
            ids: SessionIdAllocator::new(),
            sessions: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
            weak_self: weak_self.clone(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn server_capabilities(&self) -> &CapabilitySet {
        &self.server_capabilities
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionLifecycleListener>) {
        self.listeners.write().push(listener);
    }

    /// Run the handshake on a new connection.
    ///
    /// On failure nothing is registered and the connection is dropped.
    pub async fn establish(
        &self,
        connection: TransportConnection,
    ) -> Result<EstablishedSession, SessionError> {
        let TransportConnection {
            mut reader,
            mut writer,
            endpoints,
            credentials,
            transport,
        } = connection;

        let credentials = match credentials {
            Some(credentials) => credentials,
            None => self.read_credentials(reader.as_mut()).await?,
        };

        let outcome = self.auth.authenticate(&credentials).await;
        let identity = match (outcome.authenticated, outcome.identity) {
            (true, Some(identity)) => identity,
            _ => {
                let reason = outcome
                    .failure_reason
                    .map_or_else(|| "rejected".to_string(), |r| r.to_string());
                let _ = writer.close().await;
                return Err(SessionError::AuthenticationFailed(reason));
            }
        };

        let id = self.ids.allocate().ok_or(SessionError::IdSpaceExhausted)?;

        writer
            .write_frame(&WireMessage::Hello {
                capabilities: self.server_capabilities.clone(),
                session_id: Some(id),
            })
            .await?;

        let client_capabilities = self.read_client_hello(reader.as_mut()).await?;
        let capabilities = CapabilitySet::negotiate(&self.server_capabilities, &client_capabilities)?;

        let (channel, outbound) = SessionChannel::new(id, self.config.outbound_queue);
        let session = Arc::new(Session::new(
            identity,
            capabilities,
            endpoints,
            transport,
            channel.clone(),
        ));
        tokio::spawn(run_writer(channel, outbound, writer));

        self.sessions.insert(id, Arc::clone(&session));
        self.auth.register_expiry_listener(
            id,
            session.identity(),
            Arc::new(ExpiryBridge {
                manager: self.weak_self.clone(),
            }),
        );

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.session_opened(&session).await;
        }

        info!(
            session_id = %id,
            identity = %session.identity(),
            transport,
            capabilities = session.capabilities().len(),
            "[Session] session established"
        );

        Ok(EstablishedSession { session, reader })
    }

    /// Destroy a session. Returns `false` if it was already gone.
    ///
    /// Frames queued before this call are still delivered.
    pub async fn close_session(&self, id: SessionId, reason: CloseReason) -> bool {
        let Some((_, session)) = self.sessions.remove(&id) else {
            return false;
        };
        session.begin_close();

        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.session_closed(&session, reason).await;
        }
        self.auth.logout(id).await;

        info!(session_id = %id, %reason, "[Session] session closed");
        true
    }

    /// Forcibly end a session.
    ///
    /// With `wait_for_drain`, stops reading new requests and waits for
    /// in-flight ones up to the configured grace period before closing.
    pub async fn kill_session(&self, id: SessionId, wait_for_drain: bool) -> Result<(), SessionError> {
        let session = self.session(id).ok_or(SessionError::UnknownSession(id))?;

        if wait_for_drain {
            let grace = self.config.kill_grace_period;
            if !session.drain(grace).await {
                warn!(
                    session_id = %id,
                    in_flight = session.in_flight(),
                    ?grace,
                    "[Session] kill grace period elapsed with requests in flight"
                );
            }
        }

        self.close_session(id, CloseReason::Killed).await;
        Ok(())
    }

    /// Close every session.
    pub async fn shutdown_all(&self) -> usize {
        let mut closed = 0;
        for id in self.active_sessions() {
            if self.close_session(id, CloseReason::ServerShutdown).await {
                closed += 1;
            }
        }
        closed
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|s| Arc::clone(s.value()))
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.iter().map(|s| *s.key()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    async fn read_credentials(&self, reader: &mut dyn FrameReader) -> Result<Credentials, SessionError> {
        match self.read_handshake_frame(reader).await? {
            WireMessage::Auth(credentials) => Ok(credentials),
            _ => Err(SessionError::UnexpectedFrame { expected: "auth" }),
        }
    }

    async fn read_client_hello(&self, reader: &mut dyn FrameReader) -> Result<CapabilitySet, SessionError> {
        match self.read_handshake_frame(reader).await? {
            WireMessage::Hello {
                capabilities,
                session_id: None,
            } => Ok(capabilities),
            _ => Err(SessionError::UnexpectedFrame { expected: "hello" }),
        }
    }

    async fn read_handshake_frame(&self, reader: &mut dyn FrameReader) -> Result<WireMessage, SessionError> {
        let timeout: Duration = self.config.hello_timeout;
        match tokio::time::timeout(timeout, reader.read_frame()).await {
            Err(_) => Err(SessionError::HandshakeTimeout),
            Ok(Ok(Some(frame))) => Ok(frame),
            Ok(Ok(None)) => Err(TransportError::Closed.into()),
            Ok(Err(e)) => Err(e.into()),
        }
    }
}

/// Routes gateway expiry callbacks back into the manager.
struct ExpiryBridge {
    manager: Weak<SessionManager>,
}

impl SessionExpiryListener for ExpiryBridge {
    fn session_expired(&self, session_id: SessionId, reason: &str) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };
        debug!(%session_id, reason, "[Session] gateway expired session");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    manager.close_session(session_id, CloseReason::Expired).await;
                });
            }
            Err(_) => warn!(%session_id, "[Session] expiry outside a runtime ignored"),
        }
    }
}
