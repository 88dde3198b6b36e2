//! Authentication outcomes and the user table entry.

use serde::{Deserialize, Serialize};
use shared_types::Identity;
use std::fmt;
use thiserror::Error;

/// Why a credential was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Username or password wrong. Deliberately does not say which.
    InvalidCredentials,
    /// The public key is not authorized for the user.
    KeyNotAuthorized,
    /// The public key was not valid hex.
    MalformedKey,
    /// The user has no credential of this kind configured.
    MethodNotAllowed,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InvalidCredentials => "invalid username or password",
            Self::KeyNotAuthorized => "public key not authorized",
            Self::MalformedKey => "malformed public key",
            Self::MethodNotAllowed => "authentication method not allowed for user",
        };
        f.write_str(text)
    }
}

/// Result of `authenticate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub authenticated: bool,
    pub identity: Option<Identity>,
    pub failure_reason: Option<FailureReason>,
}

impl AuthResult {
    pub fn success(identity: Identity) -> Self {
        Self {
            authenticated: true,
            identity: Some(identity),
            failure_reason: None,
        }
    }

    pub fn failure(reason: FailureReason) -> Self {
        Self {
            authenticated: false,
            identity: None,
            failure_reason: Some(reason),
        }
    }
}

/// One configured user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserEntry {
    pub username: String,
    /// Hex-encoded SHA-256 of the password.
    pub password_sha256: Option<String>,
    /// Hex-encoded public keys.
    pub authorized_keys: Vec<String>,
}

/// Errors building a gateway from configuration.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user {username}: password hash is not 32 hex-encoded bytes")]
    InvalidPasswordHash { username: String },

    #[error("user {username}: authorized key {index} is not valid hex")]
    InvalidAuthorizedKey { username: String, index: usize },

    #[error("duplicate user {0}")]
    DuplicateUser(String),
}
