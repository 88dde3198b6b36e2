//! Lock owners, modes and the per-key lock record.

use shared_types::SessionId;
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::oneshot;

/// Logical identity that holds a lock.
///
/// Reentrancy is tracked per owner, not per task: two tasks acting for the
/// same session share one hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerId {
    /// A management session.
    Session(SessionId),
    /// An internal task (background jobs, tests).
    Task(u64),
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session-{}", id),
            Self::Task(id) => write!(f, "task-{}", id),
        }
    }
}

impl From<SessionId> for OwnerId {
    fn from(id: SessionId) -> Self {
        Self::Session(id)
    }
}

/// Whether the current holder may re-acquire a key it already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// Re-acquisition by the holder is refused.
    Exclusive,
    /// Re-acquisition by the holder increments a depth counter.
    #[default]
    Reentrant,
}

/// A queued acquirer.
#[derive(Debug)]
pub(crate) struct Waiter {
    pub ticket: u64,
    pub owner: OwnerId,
    pub grant: oneshot::Sender<()>,
}

/// State of one locked key.
///
/// A record exists in the table only while the key is held. Waiters are only
/// ever queued behind a holder, so "no holder" implies "no waiters" and the
/// record is removed at that point.
#[derive(Debug)]
pub(crate) struct LockRecord {
    pub holder: OwnerId,
    pub depth: u32,
    pub waiters: VecDeque<Waiter>,
}

impl LockRecord {
    pub fn held_by(owner: OwnerId) -> Self {
        Self {
            holder: owner,
            depth: 1,
            waiters: VecDeque::new(),
        }
    }

    /// Pass the lock to the oldest live waiter.
    ///
    /// Returns `false` when nobody is left to take it; the caller must then
    /// remove the record.
    pub fn hand_off(&mut self) -> bool {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.grant.send(()).is_ok() {
                self.holder = waiter.owner;
                self.depth = 1;
                return true;
            }
        }
        false
    }
}

/// Snapshot of a held key, for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoldInfo {
    pub holder: OwnerId,
    pub depth: u32,
    pub waiting: usize,
}
