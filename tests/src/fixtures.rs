//! In-memory server harness shared by the integration flows.

use nc_02_authentication::{StaticUserGateway, UserEntry};
use nc_03_session::{duplex, MemoryClient, TransportConnection, TransportError, TransportListener};
use netconf_server::{NetconfServer, ServerConfig, ServerContainer};
use serde_json::Value;
use shared_types::{Capability, CapabilitySet, OperationName, RpcReply, SessionId, WireMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Generous bound for anything the tests wait on.
pub const WAIT: Duration = Duration::from_secs(5);

pub const PASSWORD: &str = "secret";

/// Listener fed by the harness.
pub struct ChannelListener(mpsc::Receiver<TransportConnection>);

#[async_trait::async_trait]
impl TransportListener for ChannelListener {
    async fn accept(&mut self) -> Result<TransportConnection, TransportError> {
        self.0.recv().await.ok_or(TransportError::Closed)
    }
}

/// A running server with in-memory connections.
pub struct TestServer {
    pub server: Arc<NetconfServer>,
    connections: mpsc::Sender<TransportConnection>,
    accept_loop: JoinHandle<()>,
}

impl TestServer {
    pub fn users() -> Vec<UserEntry> {
        ["admin", "operator", "auditor"]
            .into_iter()
            .map(|username| UserEntry {
                username: username.into(),
                password_sha256: Some(StaticUserGateway::hash_password(PASSWORD)),
                authorized_keys: vec![],
            })
            .collect()
    }

    pub fn start() -> Self {
        Self::start_with(|_| {})
    }

    /// Start with a tweaked default configuration.
    pub fn start_with(tweak: impl FnOnce(&mut ServerConfig)) -> Self {
        let mut config = ServerConfig::default();
        config.auth.users = Self::users();
        tweak(&mut config);

        let container = match ServerContainer::new(config) {
            Ok(container) => Arc::new(container),
            Err(e) => panic!("test server failed to build: {e}"),
        };
        let server = Arc::new(NetconfServer::new(container));
        let (connections, incoming) = mpsc::channel(8);
        let accept_loop = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run(ChannelListener(incoming)).await })
        };
        Self {
            server,
            connections,
            accept_loop,
        }
    }

    pub fn container(&self) -> &Arc<ServerContainer> {
        self.server.container()
    }

    /// Connect and log in with every capability the server offers.
    pub async fn connect(&self, username: &str) -> TestClient {
        self.connect_with(
            username,
            CapabilitySet::new([
                Capability::BASE_1_1,
                Capability::NOTIFICATION_1_0,
                Capability::INTERLEAVE_1_0,
                Capability::WRITABLE_RUNNING_1_0,
                Capability::CANDIDATE_1_0,
            ]),
        )
        .await
    }

    pub async fn connect_with(&self, username: &str, capabilities: CapabilitySet) -> TestClient {
        let (connection, mut client) = duplex(64);
        self.connections
            .send(connection)
            .await
            .unwrap_or_else(|_| panic!("accept loop is gone"));
        let session_id = client
            .login(username, PASSWORD, capabilities)
            .await
            .unwrap_or_else(|e| panic!("login as {username} failed: {e}"));
        TestClient {
            client,
            session_id,
            next_id: 0,
        }
    }

    /// Wait until the server has registered `expected` sessions.
    pub async fn await_sessions(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + WAIT;
        while self.container().sessions.len() != expected {
            if tokio::time::Instant::now() > deadline {
                panic!(
                    "expected {expected} sessions, found {}",
                    self.container().sessions.len()
                );
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn stop(self) {
        self.server.shutdown();
        let _ = tokio::time::timeout(WAIT, self.accept_loop).await;
    }
}

/// A logged-in client.
pub struct TestClient {
    pub client: MemoryClient,
    pub session_id: SessionId,
    next_id: u64,
}

impl TestClient {
    /// Send a base-namespace RPC and wait for its reply.
    pub async fn call(&mut self, operation: &str, payload: Value) -> RpcReply {
        self.call_op(OperationName::base(operation), payload).await
    }

    pub async fn call_op(&mut self, operation: OperationName, payload: Value) -> RpcReply {
        let message_id = self.send_op(operation, payload).await;
        let reply = self
            .client
            .next_reply(WAIT)
            .await
            .unwrap_or_else(|| panic!("no reply to message {message_id}"));
        assert_eq!(reply.message_id, message_id, "replies out of order");
        reply
    }

    /// Send without waiting; returns the message id used.
    pub async fn send_op(&mut self, operation: OperationName, payload: Value) -> String {
        self.next_id += 1;
        let message_id = self.next_id.to_string();
        self.client
            .rpc(message_id.clone(), operation, payload)
            .await
            .unwrap_or_else(|e| panic!("send failed: {e}"));
        message_id
    }

    /// Next pushed notification, skipping nothing else.
    pub async fn next_notification(&mut self, timeout: Duration) -> Option<shared_types::Notification> {
        loop {
            match self.client.recv_timeout(timeout).await? {
                WireMessage::Notification(notification) => return Some(notification),
                _ => continue,
            }
        }
    }

    /// Whether the server closed this client's connection.
    pub async fn is_disconnected(&mut self) -> bool {
        loop {
            match tokio::time::timeout(WAIT, self.client.recv()).await {
                Ok(None) => return true,
                Ok(Some(_)) => continue,
                Err(_) => return false,
            }
        }
    }
}
