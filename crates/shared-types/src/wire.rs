//! # Wire Messages
//!
//! The frames a transport carries. Each frame is one `WireMessage`; how it is
//! encoded and delimited is the transport's business.

use crate::capabilities::CapabilitySet;
use crate::entities::SessionId;
use crate::notification::Notification;
use crate::rpc::{OperationName, RpcReply};
use serde::{Deserialize, Serialize};

/// Credentials presented by a client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum Credentials {
    /// Username and password.
    Password { username: String, password: String },
    /// Username and raw public key bytes (hex on the wire).
    PublicKey { username: String, key: String },
}

impl Credentials {
    /// Username the credentials claim.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Password { username, .. } | Self::PublicKey { username, .. } => username,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::PublicKey { username, .. } => f
                .debug_struct("PublicKey")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// One frame on a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WireMessage {
    /// Credentials for transports without native authentication.
    Auth(Credentials),
    /// Capability advertisement. Only the server's hello carries a session id.
    Hello {
        capabilities: CapabilitySet,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    /// A client request.
    Rpc {
        message_id: String,
        operation: OperationName,
        #[serde(default)]
        payload: serde_json::Value,
    },
    /// A server reply.
    RpcReply(RpcReply),
    /// A pushed notification.
    Notification(Notification),
}
