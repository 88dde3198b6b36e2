//! # Subsystem Port
//!
//! The contract a configuration participant implements. Subsystems are opaque
//! to the coordinator: it never reads or writes storage itself.

use crate::domain::SubsystemError;
use async_trait::async_trait;
use shared_types::ChangeSet;
use std::sync::Arc;

#[async_trait]
pub trait Subsystem: Send + Sync {
    /// Name used in logs and error reports.
    fn name(&self) -> &str;

    /// Validate the change. Read-mostly; never rolled back.
    async fn pre_commit(&self, change_set: &ChangeSet) -> Result<(), SubsystemError>;

    /// Apply the change.
    async fn commit(&self, change_set: &ChangeSet) -> Result<(), SubsystemError>;

    /// Undo a previous `commit` of the same change set. Best-effort.
    async fn rollback(&self, _change_set: &ChangeSet) -> Result<(), SubsystemError> {
        Ok(())
    }

    /// Operational state owned by this subsystem.
    fn retrieve_state(&self) -> Result<serde_json::Value, SubsystemError> {
        Err(SubsystemError::unsupported(self.name(), "retrieve_state"))
    }
}

pub type DynSubsystem = Arc<dyn Subsystem>;
