//! Session layer error types.

use crate::transport::TransportError;
use shared_types::{NegotiationError, SessionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("session id space exhausted")]
    IdSpaceExhausted,

    #[error("peer did not complete the handshake in time")]
    HandshakeTimeout,

    #[error("expected {expected} frame during handshake")]
    UnexpectedFrame { expected: &'static str },

    #[error("capability negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),
}
