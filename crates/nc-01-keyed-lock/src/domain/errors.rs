//! Lock manager error types.

use super::entities::OwnerId;
use std::time::Duration;
use thiserror::Error;

/// Lock manager error type.
///
/// Failing a `try_acquire` is not an error; it returns `false`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The owner already holds the key and the manager is not reentrant.
    #[error("owner already holds this key and the lock is not reentrant")]
    AlreadyHeld,

    /// Release by an owner that does not hold the key.
    #[error("{owner} does not hold this key (held by {holder})")]
    NotHolder { owner: OwnerId, holder: OwnerId },

    /// Release of a key nobody holds.
    #[error("key is not locked")]
    NotLocked,

    /// The wait exceeded the caller's deadline.
    #[error("timed out after {0:?} waiting for lock")]
    Timeout(Duration),

    /// The wait was abandoned by the manager (owner torn down).
    #[error("lock wait was cancelled")]
    Cancelled,
}
