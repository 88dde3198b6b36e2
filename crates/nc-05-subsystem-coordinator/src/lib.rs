//! # Composite Subsystem Coordinator
//!
//! Fans a configuration change out to every registered subsystem: pre-commit
//! in registration order, then commit in registration order, stopping at the
//! first failure.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Invocation order equals registration order | `service.rs` - ordered `Vec` snapshot |
//! | Nothing runs after the first failure | `service.rs` - `pre_commit_all()`, `commit_all()` |
//! | Pre-commit failures are never rolled back | `service.rs` - `Transaction::pre_commit()` |
//! | Commit rollback is opt-in, reverse order | `config.rs` - `rollback_on_commit_failure` |
//! | A transaction keeps the participants it began with | `service.rs` - `CompositeSubsystem::begin()` |
//! | The change set is shared, never mutated | `Arc<ChangeSet>` |
//!
//! ## Usage
//!
//! ```rust,ignore
//! let composite = CompositeSubsystem::new(CoordinatorConfig::default());
//! composite.register(Arc::new(ReferentialIntegrity::new()));
//! composite.register(Arc::new(Provisioning::new()));
//!
//! let mut transaction = composite.begin(change_set);
//! transaction.pre_commit().await?;
//! transaction.commit().await?;
//! ```

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

pub use config::CoordinatorConfig;
pub use domain::{
    CoordinationError, SubsystemError, SubsystemErrorKind, SubsystemHandle, TransactionState,
};
pub use ports::{DynSubsystem, Subsystem};
pub use service::{CompositeSubsystem, CoordinatorStats, CoordinatorStatsSnapshot, Transaction};
