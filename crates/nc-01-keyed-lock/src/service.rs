//! # Keyed Lock Service
//!
//! The lock table is a `DashMap` from key to `LockRecord`. Every transition of
//! a record (grant, enqueue, hand-off, reclamation) happens while holding that
//! key's map entry, so a new acquirer can never observe a record that is about
//! to be removed.
//!
//! Contended acquirers park on a oneshot receiver. Release hands the lock
//! straight to the oldest waiter by sending on its oneshot, so ownership never
//! passes through an unlocked state that a newcomer could steal.

use crate::domain::entities::{LockRecord, Waiter};
use crate::domain::{HoldInfo, LockError, LockMode, OwnerId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

/// Outcome of joining a key's queue.
enum Admission {
    Granted,
    Queued {
        ticket: u64,
        grant: oneshot::Receiver<()>,
    },
}

/// Process-wide table of per-key locks.
///
/// Constructed explicitly and shared by `Arc`; there is no global instance.
#[derive(Debug)]
pub struct KeyedLockManager<K>
where
    K: Eq + Hash,
{
    table: DashMap<K, LockRecord>,
    mode: LockMode,
    next_ticket: AtomicU64,
    next_task: AtomicU64,
}

impl<K> KeyedLockManager<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
{
    pub fn new(mode: LockMode) -> Self {
        Self {
            table: DashMap::new(),
            mode,
            next_ticket: AtomicU64::new(1),
            next_task: AtomicU64::new(1),
        }
    }

    /// A manager whose holders may re-acquire their own keys.
    pub fn reentrant() -> Self {
        Self::new(LockMode::Reentrant)
    }

    /// A manager that refuses re-acquisition by the holder.
    pub fn exclusive() -> Self {
        Self::new(LockMode::Exclusive)
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// A task owner no other caller of this manager has been given.
    pub fn task_owner(&self) -> OwnerId {
        OwnerId::Task(self.next_task.fetch_add(1, Ordering::Relaxed))
    }

    /// Wait until `owner` holds `key`.
    ///
    /// Dropping the returned future before it resolves leaves the table as if
    /// the call was never made, even if the lock had already been handed over.
    pub async fn acquire(&self, key: K, owner: OwnerId) -> Result<(), LockError> {
        let (ticket, grant) = match self.enqueue(&key, owner)? {
            Admission::Granted => return Ok(()),
            Admission::Queued { ticket, grant } => (ticket, grant),
        };

        debug!(key = ?key, %owner, ticket, "[KeyedLock] waiting for contended key");

        let mut wait = PendingWait {
            manager: self,
            key,
            owner,
            ticket,
            grant,
            settled: false,
        };
        wait.wait().await
    }

    /// `acquire` bounded by a deadline.
    pub async fn acquire_timeout(
        &self,
        key: K,
        owner: OwnerId,
        timeout: Duration,
    ) -> Result<(), LockError> {
        match tokio::time::timeout(timeout, self.acquire(key, owner)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%owner, ?timeout, "[KeyedLock] lock wait timed out");
                Err(LockError::Timeout(timeout))
            }
        }
    }

    /// Take `key` only if that needs no waiting.
    pub fn try_acquire(&self, key: K, owner: OwnerId) -> bool {
        match self.table.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(LockRecord::held_by(owner));
                true
            }
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.holder == owner && self.mode == LockMode::Reentrant {
                    record.depth += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Give up one hold on `key`.
    ///
    /// At depth zero the lock passes to the oldest waiter, or the record is
    /// removed if nobody is waiting.
    pub fn release(&self, key: &K, owner: OwnerId) -> Result<(), LockError> {
        match self.table.entry(key.clone()) {
            Entry::Vacant(_) => Err(LockError::NotLocked),
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.holder != owner {
                    return Err(LockError::NotHolder {
                        owner,
                        holder: record.holder,
                    });
                }

                record.depth -= 1;
                if record.depth > 0 {
                    return Ok(());
                }

                if record.hand_off() {
                    trace!(key = ?key, from = %owner, to = %record.holder, "[KeyedLock] handed off");
                } else {
                    occupied.remove();
                    trace!(key = ?key, "[KeyedLock] record reclaimed");
                }
                Ok(())
            }
        }
    }

    /// Drop every hold and every queued wait belonging to `owner`.
    ///
    /// Used when a session is destroyed. Returns the number of keys released.
    pub fn release_all(&self, owner: OwnerId) -> usize {
        for mut record in self.table.iter_mut() {
            record.waiters.retain(|w| w.owner != owner);
        }

        let held: Vec<K> = self
            .table
            .iter()
            .filter(|record| record.holder == owner)
            .map(|record| record.key().clone())
            .collect();

        let mut released = 0;
        for key in held {
            if let Entry::Occupied(mut occupied) = self.table.entry(key) {
                let record = occupied.get_mut();
                if record.holder != owner {
                    continue;
                }
                if !record.hand_off() {
                    occupied.remove();
                }
                released += 1;
            }
        }

        if released > 0 {
            debug!(%owner, released, "[KeyedLock] released all holds for owner");
        }
        released
    }

    /// Acquire and return a guard that releases on drop.
    pub async fn lock(&self, key: K, owner: OwnerId) -> Result<KeyGuard<'_, K>, LockError> {
        self.acquire(key.clone(), owner).await?;
        Ok(KeyGuard {
            manager: self,
            key,
            owner,
        })
    }

    /// `lock` bounded by a deadline.
    pub async fn lock_timeout(
        &self,
        key: K,
        owner: OwnerId,
        timeout: Duration,
    ) -> Result<KeyGuard<'_, K>, LockError> {
        self.acquire_timeout(key.clone(), owner, timeout).await?;
        Ok(KeyGuard {
            manager: self,
            key,
            owner,
        })
    }

    /// Non-blocking `lock`.
    pub fn try_lock(&self, key: K, owner: OwnerId) -> Option<KeyGuard<'_, K>> {
        if self.try_acquire(key.clone(), owner) {
            Some(KeyGuard {
                manager: self,
                key,
                owner,
            })
        } else {
            None
        }
    }

    /// Number of records in the table (held keys).
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn holder(&self, key: &K) -> Option<OwnerId> {
        self.table.get(key).map(|record| record.holder)
    }

    /// Number of tasks queued on `key`.
    pub fn waiting(&self, key: &K) -> usize {
        self.table.get(key).map_or(0, |record| record.waiters.len())
    }

    pub fn hold_info(&self, key: &K) -> Option<HoldInfo> {
        self.table.get(key).map(|record| HoldInfo {
            holder: record.holder,
            depth: record.depth,
            waiting: record.waiters.len(),
        })
    }

    fn enqueue(&self, key: &K, owner: OwnerId) -> Result<Admission, LockError> {
        match self.table.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(LockRecord::held_by(owner));
                Ok(Admission::Granted)
            }
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.holder == owner {
                    return match self.mode {
                        LockMode::Reentrant => {
                            record.depth += 1;
                            Ok(Admission::Granted)
                        }
                        LockMode::Exclusive => Err(LockError::AlreadyHeld),
                    };
                }

                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                record.waiters.push_back(Waiter {
                    ticket,
                    owner,
                    grant: tx,
                });
                Ok(Admission::Queued { ticket, grant: rx })
            }
        }
    }

    /// Remove a queued ticket. `false` if it is no longer queued.
    fn withdraw(&self, key: &K, ticket: u64) -> bool {
        let Some(mut record) = self.table.get_mut(key) else {
            return false;
        };
        match record.waiters.iter().position(|w| w.ticket == ticket) {
            Some(pos) => {
                record.waiters.remove(pos);
                true
            }
            None => false,
        }
    }
}

impl<K> Default for KeyedLockManager<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
{
    fn default() -> Self {
        Self::reentrant()
    }
}

/// A queued acquisition that cleans up after itself if abandoned.
struct PendingWait<'a, K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
{
    manager: &'a KeyedLockManager<K>,
    key: K,
    owner: OwnerId,
    ticket: u64,
    grant: oneshot::Receiver<()>,
    settled: bool,
}

impl<K> PendingWait<'_, K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
{
    async fn wait(&mut self) -> Result<(), LockError> {
        let outcome = (&mut self.grant).await;
        self.settled = true;
        outcome.map_err(|_| LockError::Cancelled)
    }
}

impl<K> Drop for PendingWait<'_, K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
{
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if self.manager.withdraw(&self.key, self.ticket) {
            trace!(key = ?self.key, ticket = self.ticket, "[KeyedLock] cancelled wait withdrawn");
            return;
        }
        // Granted but never observed.
        if self.grant.try_recv().is_ok() {
            if let Err(e) = self.manager.release(&self.key, self.owner) {
                warn!(key = ?self.key, error = %e, "[KeyedLock] failed to return unobserved grant");
            }
        }
    }
}

/// Releases one hold on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct KeyGuard<'a, K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
{
    manager: &'a KeyedLockManager<K>,
    key: K,
    owner: OwnerId,
}

impl<K> KeyGuard<'_, K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
{
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}

impl<K> Drop for KeyGuard<'_, K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
{
    fn drop(&mut self) {
        if let Err(e) = self.manager.release(&self.key, self.owner) {
            warn!(key = ?self.key, owner = %self.owner, error = %e, "[KeyedLock] guard release failed");
        }
    }
}
