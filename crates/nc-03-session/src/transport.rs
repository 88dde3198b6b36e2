//! # Transport Boundary
//!
//! A transport delivers whole `WireMessage` frames in both directions. How a
//! frame is encoded, delimited or encrypted stays inside the transport; the
//! session layer only reads and writes frames.

use async_trait::async_trait;
use shared_types::{Credentials, Endpoints, WireMessage};
use thiserror::Error;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    #[error("undecodable frame: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inbound half of a connection.
#[async_trait]
pub trait FrameReader: Send {
    /// Next frame, or `None` on orderly end of stream.
    async fn read_frame(&mut self) -> Result<Option<WireMessage>, TransportError>;
}

/// Outbound half of a connection.
#[async_trait]
pub trait FrameWriter: Send {
    async fn write_frame(&mut self, message: &WireMessage) -> Result<(), TransportError>;

    /// Flush and shut the outbound direction.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Accepts new connections.
#[async_trait]
pub trait TransportListener: Send {
    async fn accept(&mut self) -> Result<TransportConnection, TransportError>;
}

/// An accepted, not yet authenticated connection.
pub struct TransportConnection {
    pub reader: Box<dyn FrameReader>,
    pub writer: Box<dyn FrameWriter>,
    pub endpoints: Endpoints,
    /// Credentials the transport already verified out of band (SSH user auth).
    /// When absent, the client must send an `Auth` frame first.
    pub credentials: Option<Credentials>,
    /// Short transport name for logs.
    pub transport: &'static str,
}

impl TransportConnection {
    pub fn new(
        reader: Box<dyn FrameReader>,
        writer: Box<dyn FrameWriter>,
        endpoints: Endpoints,
        transport: &'static str,
    ) -> Self {
        Self {
            reader,
            writer,
            endpoints,
            credentials: None,
            transport,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

impl std::fmt::Debug for TransportConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConnection")
            .field("endpoints", &self.endpoints)
            .field("transport", &self.transport)
            .field("pre_authenticated", &self.credentials.is_some())
            .finish()
    }
}
