//! # Keyed Lock Manager
//!
//! Mutual exclusion on arbitrary keys (datastore name, configuration subtree,
//! session id), reentrant per logical owner, with an opportunistic try-lock
//! variant and cancellable, deadline-bounded waits.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | At most one owner holds a key at any instant | `service.rs` - `enqueue()`, `try_acquire()` under the map entry |
//! | N reentrant acquires need N releases | `service.rs` - `LockRecord::depth` |
//! | Released-to-idle keys leave the table | `service.rs` - `release()` removes via the occupied entry |
//! | Waiters are served first-come-first-served per key | `domain/entities.rs` - `LockRecord::hand_off()` |
//! | A cancelled wait never strands the key | `service.rs` - `PendingWait::drop()` |
//!
//! ## Lock Lifecycle
//!
//! ```text
//! [absent] ──acquire──→ [held d=1] ──acquire (same owner)──→ [held d+1]
//!     ↑                     │
//!     │                 release (d=0)
//!     │                     ├── waiter queued ──→ [held by waiter, d=1]
//!     └─────────────────────┴── no waiter ──→ record removed
//! ```
//!
//! No fairness is promised across different keys.

pub mod domain;
pub mod service;

pub use domain::{HoldInfo, LockError, LockMode, OwnerId};
pub use service::{KeyGuard, KeyedLockManager};
