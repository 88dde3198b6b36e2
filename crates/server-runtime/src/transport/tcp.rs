//! # TCP Transport
//!
//! Carries JSON-encoded `WireMessage` frames over TCP, each terminated by the
//! NETCONF 1.0 end-of-message marker `]]>]]>`.
//!
//! TCP has no native authentication, so clients send an `auth` frame before
//! their hello.
//!
//! `read_frame` is cancel-safe: bytes are only moved into the frame buffer
//! after a read completes, and a partial frame survives a dropped future.

use async_trait::async_trait;
use nc_03_session::{FrameReader, FrameWriter, TransportConnection, TransportError, TransportListener};
use shared_types::{Endpoints, WireMessage};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

/// End-of-message marker.
pub const FRAME_DELIMITER: &[u8] = b"]]>]]>";

const READ_CHUNK: usize = 8 * 1024;

/// Splits a byte stream into delimited frames.
pub struct DelimitedReader<R> {
    inner: R,
    buffer: Vec<u8>,
    max_frame_bytes: usize,
    /// Dropping an oversized frame until its delimiter shows up.
    discarding: bool,
    eof: bool,
}

impl<R: AsyncRead + Unpin + Send> DelimitedReader<R> {
    pub fn new(inner: R, max_frame_bytes: usize) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(READ_CHUNK),
            max_frame_bytes,
            discarding: false,
            eof: false,
        }
    }

    /// Next complete frame body, without the delimiter.
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            if let Some(end) = find_delimiter(&self.buffer) {
                let frame: Vec<u8> = self.buffer.drain(..end + FRAME_DELIMITER.len()).take(end).collect();
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                if frame.len() > self.max_frame_bytes {
                    return Err(TransportError::FrameTooLarge {
                        size: frame.len(),
                        max: self.max_frame_bytes,
                    });
                }
                if frame.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                return Ok(Some(frame));
            }

            if self.buffer.len() > self.max_frame_bytes + FRAME_DELIMITER.len() {
                let size = self.buffer.len();
                // Keep a tail that could be the start of the delimiter.
                let keep = FRAME_DELIMITER.len() - 1;
                self.buffer.drain(..size - keep);
                if !self.discarding {
                    self.discarding = true;
                    return Err(TransportError::FrameTooLarge {
                        size,
                        max: self.max_frame_bytes,
                    });
                }
            }

            if self.eof {
                if !self.buffer.iter().all(u8::is_ascii_whitespace) && !self.discarding {
                    debug!(bytes = self.buffer.len(), "[Transport] partial frame at end of stream");
                }
                self.buffer.clear();
                return Ok(None);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let read = self.inner.read(&mut chunk).await?;
            if read == 0 {
                self.eof = true;
            } else {
                self.buffer.extend_from_slice(&chunk[..read]);
            }
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameReader for DelimitedReader<R> {
    async fn read_frame(&mut self) -> Result<Option<WireMessage>, TransportError> {
        match self.next_frame().await? {
            Some(frame) => Ok(Some(serde_json::from_slice(&frame)?)),
            None => Ok(None),
        }
    }
}

/// Writes frames followed by the delimiter.
pub struct DelimitedWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin + Send> DelimitedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FrameWriter for DelimitedWriter<W> {
    async fn write_frame(&mut self, message: &WireMessage) -> Result<(), TransportError> {
        let mut frame = serde_json::to_vec(message)?;
        frame.extend_from_slice(FRAME_DELIMITER);
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(FRAME_DELIMITER.len())
        .position(|window| window == FRAME_DELIMITER)
}

/// Wrap an accepted stream as a session transport.
pub fn connection_from_stream(stream: TcpStream, max_frame_bytes: usize) -> TransportConnection {
    let endpoints = Endpoints {
        source: stream.peer_addr().ok(),
        destination: stream.local_addr().ok(),
    };
    if let Err(e) = stream.set_nodelay(true) {
        warn!("[Transport] could not disable Nagle: {}", e);
    }
    let (read_half, write_half) = stream.into_split();
    TransportConnection::new(
        Box::new(DelimitedReader::new(read_half, max_frame_bytes)),
        Box::new(DelimitedWriter::new(write_half)),
        endpoints,
        "tcp",
    )
}

/// Accepts TCP connections.
pub struct TcpTransportListener {
    listener: TcpListener,
    max_frame_bytes: usize,
}

impl TcpTransportListener {
    pub async fn bind(address: &str, max_frame_bytes: usize) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            listener,
            max_frame_bytes,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }
}

#[async_trait]
impl TransportListener for TcpTransportListener {
    async fn accept(&mut self) -> Result<TransportConnection, TransportError> {
        let (stream, peer) = self.listener.accept().await?;
        debug!(%peer, "[Transport] accepted connection");
        Ok(connection_from_stream(stream, self.max_frame_bytes))
    }
}
