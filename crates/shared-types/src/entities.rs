//! # Core Domain Entities
//!
//! Identifiers that tie a management conversation together.
//!
//! ## Clusters
//!
//! - **Session**: `SessionId`, `SessionIdAllocator`, `Identity`, `Endpoints`
//! - **Datastores**: `Datastore`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// CLUSTER A: THE SESSION
// =============================================================================

/// Numeric NETCONF session identifier.
///
/// Assigned once by a `SessionIdAllocator` and never reused while the
/// process runs. Zero is reserved and never handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u32);

impl SessionId {
    /// Get the raw numeric value.
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic session id source.
///
/// One allocator is owned by the session manager; ids start at 1.
#[derive(Debug)]
pub struct SessionIdAllocator {
    next: AtomicU32,
}

impl SessionIdAllocator {
    /// Create an allocator whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Allocate the next id.
    ///
    /// Returns `None` once the id space is exhausted rather than wrapping
    /// around onto ids that may still be live.
    pub fn allocate(&self) -> Option<SessionId> {
        self.next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(1)
            })
            .ok()
            .map(SessionId)
    }
}

impl Default for SessionIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The authenticated principal behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

/// Username used for events that originate inside the server.
pub const SYSTEM_IDENTITY: &str = "$system";

impl Identity {
    /// Create an identity from a username.
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    /// The identity attached to server-originated notifications.
    #[must_use]
    pub fn system() -> Self {
        Self(SYSTEM_IDENTITY.to_string())
    }

    /// Whether this is the server's own identity.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.0 == SYSTEM_IDENTITY
    }

    /// Borrow the username.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source and destination network endpoints of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Address of the managing client.
    pub source: Option<SocketAddr>,
    /// Local address the server accepted the connection on.
    pub destination: Option<SocketAddr>,
}

impl Endpoints {
    /// Endpoints for a transport that has no network addresses (in-memory).
    #[must_use]
    pub fn local() -> Self {
        Self {
            source: None,
            destination: None,
        }
    }
}

// =============================================================================
// CLUSTER B: DATASTORES
// =============================================================================

/// Configuration datastores a session can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datastore {
    /// The running configuration.
    Running,
    /// The candidate configuration.
    Candidate,
    /// The startup configuration.
    Startup,
}

impl Datastore {
    /// Protocol name of the datastore.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Candidate => "candidate",
            Self::Startup => "startup",
        }
    }
}

impl fmt::Display for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
