//! # Composite Subsystem Service
//!
//! Holds the ordered participant list and runs transactions over it.
//!
//! The list is a copy-on-write snapshot: `register`/`unregister` swap in a new
//! `Arc<Vec<_>>`, and `Transaction::begin` clones the current `Arc`. A running
//! transaction therefore keeps the participant list it started with.

use crate::config::CoordinatorConfig;
use crate::domain::{CoordinationError, SubsystemError, SubsystemHandle, TransactionState};
use crate::ports::{DynSubsystem, Subsystem};
use async_trait::async_trait;
use nc_01_keyed_lock::{KeyedLockManager, OwnerId};
use parking_lot::RwLock;
use shared_types::{ChangeSet, Datastore, RpcError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
struct Participant {
    handle: SubsystemHandle,
    subsystem: DynSubsystem,
}

type Snapshot = Arc<Vec<Participant>>;

/// Transaction counters. Lock-free; the runtime copies them into Prometheus.
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    pub started: AtomicU64,
    pub committed: AtomicU64,
    pub pre_commit_failed: AtomicU64,
    pub commit_failed: AtomicU64,
    pub rolled_back: AtomicU64,
}

/// Point-in-time copy of `CoordinatorStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStatsSnapshot {
    pub started: u64,
    pub committed: u64,
    pub pre_commit_failed: u64,
    pub commit_failed: u64,
    pub rolled_back: u64,
}

impl CoordinatorStats {
    pub fn snapshot(&self) -> CoordinatorStatsSnapshot {
        CoordinatorStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            pre_commit_failed: self.pre_commit_failed.load(Ordering::Relaxed),
            commit_failed: self.commit_failed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
        }
    }
}

/// Ordered collection of subsystems, invoked as one.
pub struct CompositeSubsystem {
    participants: RwLock<Snapshot>,
    next_handle: AtomicU64,
    config: CoordinatorConfig,
    stats: Arc<CoordinatorStats>,
}

impl CompositeSubsystem {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            participants: RwLock::new(Arc::new(Vec::new())),
            next_handle: AtomicU64::new(1),
            config,
            stats: Arc::new(CoordinatorStats::default()),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<CoordinatorStats> {
        &self.stats
    }

    /// Append a subsystem. Registration order is invocation order.
    pub fn register(&self, subsystem: DynSubsystem) -> SubsystemHandle {
        let handle = SubsystemHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        info!("[Coordinator] Registering subsystem {} as {}", subsystem.name(), handle);

        let mut guard = self.participants.write();
        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend(guard.iter().cloned());
        next.push(Participant { handle, subsystem });
        *guard = Arc::new(next);
        handle
    }

    /// Remove a subsystem. Transactions already begun still invoke it.
    pub fn unregister(&self, handle: SubsystemHandle) -> bool {
        let mut guard = self.participants.write();
        if !guard.iter().any(|p| p.handle == handle) {
            return false;
        }
        let next: Vec<Participant> = guard.iter().filter(|p| p.handle != handle).cloned().collect();
        *guard = Arc::new(next);
        info!("[Coordinator] Unregistered {}", handle);
        true
    }

    pub fn len(&self) -> usize {
        self.participants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.read().is_empty()
    }

    /// Names of the current participants, in invocation order.
    pub fn subsystem_names(&self) -> Vec<String> {
        self.participants
            .read()
            .iter()
            .map(|p| p.subsystem.name().to_string())
            .collect()
    }

    fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.participants.read())
    }

    /// Start a transaction over the current participants.
    pub fn begin(&self, change_set: Arc<ChangeSet>) -> Transaction {
        self.stats.started.fetch_add(1, Ordering::Relaxed);
        Transaction {
            change_set,
            participants: self.snapshot(),
            rollback_on_commit_failure: self.config.rollback_on_commit_failure,
            state: TransactionState::Open,
            stats: Arc::clone(&self.stats),
        }
    }

    /// Pre-commit then commit.
    pub async fn apply(&self, change_set: Arc<ChangeSet>) -> Result<(), CoordinationError> {
        let mut transaction = self.begin(change_set);
        transaction.pre_commit().await.map_err(CoordinationError::PreCommit)?;
        transaction.commit().await
    }

    /// `apply` inside a critical section on the change set's datastore.
    ///
    /// `admit` runs once the section is held and may refuse the transaction
    /// before any participant sees it. The section is meant for fresh,
    /// single-use owners; two transactions never share it.
    pub async fn apply_exclusive<F>(
        &self,
        change_set: Arc<ChangeSet>,
        locks: &KeyedLockManager<Datastore>,
        owner: OwnerId,
        timeout: Duration,
        admit: F,
    ) -> Result<(), CoordinationError>
    where
        F: FnOnce() -> Result<(), RpcError> + Send,
    {
        let _guard = locks
            .lock_timeout(change_set.datastore(), owner, timeout)
            .await?;
        admit().map_err(CoordinationError::Refused)?;
        self.apply(change_set).await
    }
}

impl Default for CompositeSubsystem {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

#[async_trait]
impl Subsystem for CompositeSubsystem {
    fn name(&self) -> &str {
        "composite"
    }

    /// Fail-fast pre-commit over the current participants; the first error is
    /// returned unchanged.
    async fn pre_commit(&self, change_set: &ChangeSet) -> Result<(), SubsystemError> {
        pre_commit_all(&self.snapshot(), change_set).await
    }

    /// Fail-fast commit; returns the failing participant's error unchanged.
    async fn commit(&self, change_set: &ChangeSet) -> Result<(), SubsystemError> {
        let participants = self.snapshot();
        commit_all(
            &participants,
            change_set,
            self.config.rollback_on_commit_failure,
        )
        .await
        .map_err(|failure| match failure {
            CoordinationError::CommitFailed { source, .. } => source,
            other => SubsystemError::fatal("composite", other.to_string()),
        })
    }

    async fn rollback(&self, change_set: &ChangeSet) -> Result<(), SubsystemError> {
        let participants = self.snapshot();
        let mut first_failure = None;
        for participant in participants.iter().rev() {
            if let Err(e) = participant.subsystem.rollback(change_set).await {
                warn!("[Coordinator] Rollback failed: {}", e);
                first_failure.get_or_insert(e);
            }
        }
        first_failure.map_or(Ok(()), Err)
    }

    /// State lives in the individual subsystems; asking the composite for it
    /// is a caller bug.
    fn retrieve_state(&self) -> Result<serde_json::Value, SubsystemError> {
        panic!("retrieve_state is not supported on the composite subsystem; query the individual subsystems");
    }
}

/// One configuration change travelling through the participants.
pub struct Transaction {
    change_set: Arc<ChangeSet>,
    participants: Snapshot,
    rollback_on_commit_failure: bool,
    state: TransactionState,
    stats: Arc<CoordinatorStats>,
}

impl Transaction {
    pub fn id(&self) -> Uuid {
        self.change_set.id()
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn change_set(&self) -> &Arc<ChangeSet> {
        &self.change_set
    }

    /// Names of the participants fixed at `begin`, in invocation order.
    pub fn participants(&self) -> Vec<String> {
        self.participants
            .iter()
            .map(|p| p.subsystem.name().to_string())
            .collect()
    }

    /// Run `pre_commit` on each participant in order, stopping at the first
    /// failure. Participants before the failing one are not rolled back.
    pub async fn pre_commit(&mut self) -> Result<(), SubsystemError> {
        if self.state != TransactionState::Open {
            return Err(SubsystemError::fatal(
                "composite",
                format!("transaction is {}, cannot pre-commit", self.state),
            ));
        }
        match pre_commit_all(&self.participants, &self.change_set).await {
            Ok(()) => {
                self.state = TransactionState::PreCommitted;
                debug!(transaction = %self.id(), "[Coordinator] pre-commit passed");
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::Failed;
                self.stats.pre_commit_failed.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Run `commit` on each participant in order, stopping at the first
    /// failure.
    pub async fn commit(&mut self) -> Result<(), CoordinationError> {
        if self.state != TransactionState::PreCommitted {
            return Err(CoordinationError::InvalidState {
                state: self.state,
                operation: "commit",
            });
        }
        match commit_all(
            &self.participants,
            &self.change_set,
            self.rollback_on_commit_failure,
        )
        .await
        {
            Ok(()) => {
                self.state = TransactionState::Committed;
                self.stats.committed.fetch_add(1, Ordering::Relaxed);
                info!(transaction = %self.id(), changes = self.change_set.len(), "[Coordinator] committed");
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::Failed;
                self.stats.commit_failed.fetch_add(1, Ordering::Relaxed);
                if let CoordinationError::CommitFailed { rolled_back, .. } = &e {
                    self.stats
                        .rolled_back
                        .fetch_add(rolled_back.len() as u64, Ordering::Relaxed);
                }
                Err(e)
            }
        }
    }
}

async fn pre_commit_all(
    participants: &[Participant],
    change_set: &ChangeSet,
) -> Result<(), SubsystemError> {
    for participant in participants {
        if let Err(e) = participant.subsystem.pre_commit(change_set).await {
            warn!(
                transaction = %change_set.id(),
                subsystem = participant.subsystem.name(),
                "[Coordinator] pre-commit rejected: {}", e
            );
            return Err(e);
        }
    }
    Ok(())
}

async fn commit_all(
    participants: &[Participant],
    change_set: &ChangeSet,
    rollback_on_failure: bool,
) -> Result<(), CoordinationError> {
    for (index, participant) in participants.iter().enumerate() {
        let Err(source) = participant.subsystem.commit(change_set).await else {
            continue;
        };

        let applied = &participants[..index];
        let committed: Vec<String> = applied
            .iter()
            .map(|p| p.subsystem.name().to_string())
            .collect();
        let mut rolled_back = Vec::new();
        let mut rollback_failures = Vec::new();

        if rollback_on_failure {
            for done in applied.iter().rev() {
                match done.subsystem.rollback(change_set).await {
                    Ok(()) => rolled_back.push(done.subsystem.name().to_string()),
                    Err(e) => rollback_failures.push(e),
                }
            }
        }

        let failure = CoordinationError::CommitFailed {
            subsystem: participant.subsystem.name().to_string(),
            source,
            committed,
            rolled_back,
            rollback_failures,
        };
        error!(transaction = %change_set.id(), "[Coordinator] {}", failure);
        return Err(failure);
    }
    Ok(())
}
