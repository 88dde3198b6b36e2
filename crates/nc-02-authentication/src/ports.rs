//! # Authentication Ports
//!
//! The contract the session layer authenticates through. Concrete transports
//! hand their credentials to an `AuthenticationGateway` and never see how they
//! are checked.

use crate::domain::AuthResult;
use async_trait::async_trait;
use shared_types::{Credentials, Identity, SessionId};
use std::sync::Arc;

/// Callback for sessions the gateway decides are no longer valid.
pub trait SessionExpiryListener: Send + Sync {
    fn session_expired(&self, session_id: SessionId, reason: &str);
}

/// Maps transport credentials to an authenticated identity.
#[async_trait]
pub trait AuthenticationGateway: Send + Sync {
    /// Check a credential of any supported kind.
    async fn authenticate(&self, credentials: &Credentials) -> AuthResult;

    /// Check a raw public key for `username`.
    async fn authenticate_public_key(&self, username: &str, key: &[u8]) -> bool;

    /// Forget any per-session state.
    async fn logout(&self, session_id: SessionId);

    /// Ask to be told if `session_id` (authenticated as `identity`) expires.
    ///
    /// Gateways that never expire sessions may ignore this.
    fn register_expiry_listener(
        &self,
        _session_id: SessionId,
        _identity: &Identity,
        _listener: Arc<dyn SessionExpiryListener>,
    ) {
    }
}
