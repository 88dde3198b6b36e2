//! # Session Channel
//!
//! The single outbound path of a session. RPC replies and pushed
//! notifications share one bounded queue, drained in order by the session's
//! writer task.

use crate::transport::FrameWriter;
use shared_types::{Notification, RpcReply, SessionId, WireMessage};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The session is closing or its writer has stopped.
    #[error("session channel closed")]
    Closed,
    /// The outbound queue is at capacity.
    #[error("session outbound queue full")]
    Full,
}

/// Cloneable handle to a session's outbound queue.
#[derive(Debug, Clone)]
pub struct SessionChannel {
    session_id: SessionId,
    tx: mpsc::Sender<WireMessage>,
    closing: Arc<watch::Sender<bool>>,
}

impl SessionChannel {
    /// Create a channel and the receiving end its writer drains.
    pub fn new(session_id: SessionId, capacity: usize) -> (Self, mpsc::Receiver<WireMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (closing, _) = watch::channel(false);
        let channel = Self {
            session_id,
            tx,
            closing: Arc::new(closing),
        };
        (channel, rx)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Queue a frame, waiting for space.
    pub async fn send(&self, message: WireMessage) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.tx.send(message).await.map_err(|_| ChannelError::Closed)
    }

    pub async fn send_reply(&self, reply: RpcReply) -> Result<(), ChannelError> {
        self.send(WireMessage::RpcReply(reply)).await
    }

    /// Queue a frame only if there is room now.
    pub fn try_send(&self, message: WireMessage) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Full,
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    pub fn try_notify(&self, notification: Notification) -> Result<(), ChannelError> {
        self.try_send(WireMessage::Notification(notification))
    }

    pub fn is_closed(&self) -> bool {
        *self.closing.borrow() || self.tx.is_closed()
    }

    /// Stop accepting frames. Returns `true` the first time.
    pub(crate) fn close(&self) -> bool {
        !self.closing.send_replace(true)
    }

    pub(crate) fn closing_signal(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }
}

/// Resolve once the flag is set (or its sender is gone).
pub(crate) async fn wait_closing(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Drain the outbound queue into the transport until the session closes.
///
/// Frames already queued when the session closes are still written. A write
/// failure closes the session.
pub(crate) async fn run_writer(
    channel: SessionChannel,
    mut outbound: mpsc::Receiver<WireMessage>,
    mut writer: Box<dyn FrameWriter>,
) {
    let session_id = channel.session_id();
    let mut closing = channel.closing_signal();

    loop {
        tokio::select! {
            biased;
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = writer.write_frame(&frame).await {
                    warn!(%session_id, error = %e, "[Session] outbound write failed");
                    channel.close();
                    return;
                }
            }
            _ = wait_closing(&mut closing) => {
                while let Ok(frame) = outbound.try_recv() {
                    if writer.write_frame(&frame).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }

    channel.close();
    if let Err(e) = writer.close().await {
        debug!(%session_id, error = %e, "[Session] transport close failed");
    }
    debug!(%session_id, "[Session] writer stopped");
}
