//! In-process transport. The server end is a `TransportConnection`; the client
//! end sends and receives `WireMessage` values directly.

use crate::transport::{FrameReader, FrameWriter, TransportConnection, TransportError};
use async_trait::async_trait;
use shared_types::{
    CapabilitySet, Credentials, Endpoints, OperationName, RpcReply, SessionId, WireMessage,
};
use std::time::Duration;
use tokio::sync::mpsc;

struct MemoryReader {
    rx: mpsc::Receiver<WireMessage>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn read_frame(&mut self) -> Result<Option<WireMessage>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

struct MemoryWriter {
    tx: Option<mpsc::Sender<WireMessage>>,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn write_frame(&mut self, message: &WireMessage) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(message.clone())
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

/// Client end of an in-memory connection.
#[derive(Debug)]
pub struct MemoryClient {
    tx: Option<mpsc::Sender<WireMessage>>,
    rx: mpsc::Receiver<WireMessage>,
}

/// Create a connected pair with `capacity` frames of buffering each way.
pub fn duplex(capacity: usize) -> (TransportConnection, MemoryClient) {
    let (client_tx, server_rx) = mpsc::channel(capacity);
    let (server_tx, client_rx) = mpsc::channel(capacity);

    let connection = TransportConnection::new(
        Box::new(MemoryReader { rx: server_rx }),
        Box::new(MemoryWriter {
            tx: Some(server_tx),
        }),
        Endpoints::local(),
        "memory",
    );
    let client = MemoryClient {
        tx: Some(client_tx),
        rx: client_rx,
    };
    (connection, client)
}

impl MemoryClient {
    pub async fn send(&self, message: WireMessage) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(message).await.map_err(|_| TransportError::Closed)
    }

    /// Next frame from the server, `None` once the server closed its side.
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.rx.recv().await
    }

    /// `recv` with a deadline.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<WireMessage> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Authenticate with a password, exchange hellos and return the session id
    /// the server assigned.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
        capabilities: CapabilitySet,
    ) -> Result<SessionId, TransportError> {
        self.send(WireMessage::Auth(Credentials::Password {
            username: username.to_string(),
            password: password.to_string(),
        }))
        .await?;
        self.hello(capabilities).await
    }

    /// Exchange hellos (credentials already supplied) and return the session id.
    pub async fn hello(&mut self, capabilities: CapabilitySet) -> Result<SessionId, TransportError> {
        let session_id = match self.recv().await {
            Some(WireMessage::Hello {
                session_id: Some(id),
                ..
            }) => id,
            _ => return Err(TransportError::Closed),
        };
        self.send(WireMessage::Hello {
            capabilities,
            session_id: None,
        })
        .await?;
        Ok(session_id)
    }

    /// Send an RPC.
    pub async fn rpc(
        &self,
        message_id: impl Into<String>,
        operation: OperationName,
        payload: serde_json::Value,
    ) -> Result<(), TransportError> {
        self.send(WireMessage::Rpc {
            message_id: message_id.into(),
            operation,
            payload,
        })
        .await
    }

    /// Next `rpc-reply`, skipping notifications. `None` on close or timeout.
    pub async fn next_reply(&mut self, timeout: Duration) -> Option<RpcReply> {
        loop {
            match self.recv_timeout(timeout).await? {
                WireMessage::RpcReply(reply) => return Some(reply),
                _ => continue,
            }
        }
    }

    /// Close the client's sending side.
    pub fn close(&mut self) {
        self.tx = None;
    }
}
