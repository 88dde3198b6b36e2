use serde::{Deserialize, Serialize};

/// Coordinator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// After a commit failure, roll back the subsystems that already committed,
    /// in reverse registration order.
    pub rollback_on_commit_failure: bool,
}
