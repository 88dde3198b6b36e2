use serde::{Deserialize, Serialize};
use std::fmt;

/// Returned by `register`; the only way to unregister a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubsystemHandle(pub(crate) u64);

impl SubsystemHandle {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubsystemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subsystem#{}", self.0)
    }
}

/// Progress of one transaction.
///
/// ```text
/// [Open] ──pre_commit ok──→ [PreCommitted] ──commit ok──→ [Committed]
///    │                            │
///    └──── failure ───────────────┴──────────────→ [Failed]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionState {
    Open,
    PreCommitted,
    Committed,
    Failed,
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::PreCommitted => "pre-committed",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
