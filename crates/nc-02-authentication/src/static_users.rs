//! # Static User Gateway
//!
//! An in-memory user table loaded from configuration. Passwords are stored as
//! SHA-256 digests and compared in constant time; public keys are compared
//! byte-for-byte in constant time.

use crate::domain::{AuthError, AuthResult, FailureReason, UserEntry};
use crate::ports::{AuthenticationGateway, SessionExpiryListener};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use shared_types::{Credentials, Identity, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

/// Digest compared when the user does not exist, so the miss costs the same.
const DUMMY_DIGEST: [u8; 32] = [0u8; 32];

#[derive(Debug)]
struct StoredUser {
    password: Option<[u8; 32]>,
    keys: Vec<Vec<u8>>,
}

struct Registration {
    identity: Identity,
    listener: Arc<dyn SessionExpiryListener>,
}

/// Gateway backed by a fixed user list.
pub struct StaticUserGateway {
    users: RwLock<HashMap<String, StoredUser>>,
    registrations: DashMap<SessionId, Registration>,
}

impl StaticUserGateway {
    pub fn new(entries: impl IntoIterator<Item = UserEntry>) -> Result<Self, AuthError> {
        let mut users = HashMap::new();
        for entry in entries {
            let password = entry
                .password_sha256
                .as_deref()
                .map(|digest| decode_digest(&entry.username, digest))
                .transpose()?;

            let keys = entry
                .authorized_keys
                .iter()
                .enumerate()
                .map(|(index, key)| {
                    hex::decode(key).map_err(|_| AuthError::InvalidAuthorizedKey {
                        username: entry.username.clone(),
                        index,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            if users
                .insert(entry.username.clone(), StoredUser { password, keys })
                .is_some()
            {
                return Err(AuthError::DuplicateUser(entry.username));
            }
        }

        info!(users = users.len(), "[Auth] static user table loaded");
        Ok(Self {
            users: RwLock::new(users),
            registrations: DashMap::new(),
        })
    }

    /// Hex SHA-256 of a password, in the form `UserEntry` expects.
    pub fn hash_password(password: &str) -> String {
        hex::encode(Sha256::digest(password.as_bytes()))
    }

    /// Remove a user and expire every session authenticated as them.
    ///
    /// Returns the number of sessions expired.
    pub fn revoke_user(&self, username: &str) -> usize {
        self.users.write().remove(username);

        let affected: Vec<SessionId> = self
            .registrations
            .iter()
            .filter(|r| r.identity.as_str() == username)
            .map(|r| *r.key())
            .collect();

        let mut expired = 0;
        for session_id in affected {
            if let Some((_, registration)) = self.registrations.remove(&session_id) {
                registration
                    .listener
                    .session_expired(session_id, "credentials revoked");
                expired += 1;
            }
        }

        warn!(username, expired, "[Auth] user revoked");
        expired
    }

    /// Sessions with a registered expiry listener.
    pub fn tracked_sessions(&self) -> usize {
        self.registrations.len()
    }

    fn check_password(&self, username: &str, password: &str) -> AuthResult {
        let presented: [u8; 32] = Sha256::digest(password.as_bytes()).into();
        let users = self.users.read();

        let (stored, known) = match users.get(username) {
            Some(StoredUser {
                password: Some(digest),
                ..
            }) => (digest, true),
            Some(_) => return AuthResult::failure(FailureReason::MethodNotAllowed),
            None => (&DUMMY_DIGEST, false),
        };

        if bool::from(stored.as_slice().ct_eq(presented.as_slice())) && known {
            AuthResult::success(Identity::new(username))
        } else {
            AuthResult::failure(FailureReason::InvalidCredentials)
        }
    }

    fn check_key(&self, username: &str, key: &[u8]) -> Result<(), FailureReason> {
        let users = self.users.read();
        let user = users
            .get(username)
            .ok_or(FailureReason::InvalidCredentials)?;
        if user.keys.is_empty() {
            return Err(FailureReason::MethodNotAllowed);
        }
        if user
            .keys
            .iter()
            .any(|authorized| bool::from(authorized.as_slice().ct_eq(key)))
        {
            Ok(())
        } else {
            Err(FailureReason::KeyNotAuthorized)
        }
    }
}

#[async_trait]
impl AuthenticationGateway for StaticUserGateway {
    async fn authenticate(&self, credentials: &Credentials) -> AuthResult {
        let result = match credentials {
            Credentials::Password { username, password } => {
                self.check_password(username, password)
            }
            Credentials::PublicKey { username, key } => match hex::decode(key) {
                Ok(raw) => match self.check_key(username, &raw) {
                    Ok(()) => AuthResult::success(Identity::new(username.as_str())),
                    Err(reason) => AuthResult::failure(reason),
                },
                Err(_) => AuthResult::failure(FailureReason::MalformedKey),
            },
        };

        match result.failure_reason {
            None => debug!(username = credentials.username(), "[Auth] authenticated"),
            Some(reason) => {
                warn!(username = credentials.username(), %reason, "[Auth] authentication failed")
            }
        }
        result
    }

    async fn authenticate_public_key(&self, username: &str, key: &[u8]) -> bool {
        self.check_key(username, key).is_ok()
    }

    async fn logout(&self, session_id: SessionId) {
        if self.registrations.remove(&session_id).is_some() {
            debug!(%session_id, "[Auth] session logged out");
        }
    }

    fn register_expiry_listener(
        &self,
        session_id: SessionId,
        identity: &Identity,
        listener: Arc<dyn SessionExpiryListener>,
    ) {
        self.registrations.insert(
            session_id,
            Registration {
                identity: identity.clone(),
                listener,
            },
        );
    }
}

fn decode_digest(username: &str, digest: &str) -> Result<[u8; 32], AuthError> {
    let invalid = || AuthError::InvalidPasswordHash {
        username: username.to_string(),
    };
    hex::decode(digest)
        .map_err(|_| invalid())?
        .try_into()
        .map_err(|_| invalid())
}
