//! Coordinator error types.
//!
//! `SubsystemError` is what a participant reports. `CoordinationError` is what
//! the coordinator reports about a whole transaction; it keeps the failing
//! participant's error as its source.

use super::entities::TransactionState;
use nc_01_keyed_lock::LockError;
use serde::{Deserialize, Serialize};
use shared_types::RpcError;
use std::fmt;
use thiserror::Error;

/// Categories of subsystem errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubsystemErrorKind {
    /// The change set is semantically invalid for this subsystem.
    Validation,
    /// The subsystem could not apply the change.
    Fatal,
    /// The subsystem does not implement the requested operation.
    Unsupported,
}

impl fmt::Display for SubsystemErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "Validation"),
            Self::Fatal => write!(f, "Fatal"),
            Self::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// Error reported by a single subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("[{subsystem}] {kind}: {message}")]
pub struct SubsystemError {
    /// Name of the reporting subsystem.
    pub subsystem: String,
    pub kind: SubsystemErrorKind,
    pub message: String,
    /// Schema location the error refers to, when known.
    pub path: Option<String>,
}

impl SubsystemError {
    pub fn new(
        subsystem: impl Into<String>,
        kind: SubsystemErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subsystem: subsystem.into(),
            kind,
            message: message.into(),
            path: None,
        }
    }

    pub fn validation(subsystem: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(subsystem, SubsystemErrorKind::Validation, message)
    }

    pub fn fatal(subsystem: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(subsystem, SubsystemErrorKind::Fatal, message)
    }

    pub fn unsupported(subsystem: impl Into<String>, operation: &str) -> Self {
        Self::new(
            subsystem,
            SubsystemErrorKind::Unsupported,
            format!("{operation} is not supported"),
        )
    }

    #[must_use]
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn is_validation(&self) -> bool {
        self.kind == SubsystemErrorKind::Validation
    }

    /// Protocol form of the error for an `rpc-reply`.
    pub fn to_rpc_error(&self) -> RpcError {
        let error = match self.kind {
            SubsystemErrorKind::Validation => RpcError::invalid_value(self.message.clone()),
            SubsystemErrorKind::Fatal => RpcError::operation_failed(self.message.clone()),
            SubsystemErrorKind::Unsupported => RpcError::operation_not_supported(&self.message),
        };
        let error = error.with_app_tag(self.subsystem.clone());
        match &self.path {
            Some(path) => error.with_path(path.clone()),
            None => error,
        }
    }
}

/// Coordinator error type.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// A subsystem rejected the change during pre-commit.
    #[error("pre-commit rejected: {0}")]
    PreCommit(#[source] SubsystemError),

    /// A subsystem failed during commit. Earlier subsystems may have applied
    /// the change.
    #[error(
        "commit failed in {subsystem}: {source} (committed: {committed:?}, rolled back: {rolled_back:?}, rollback failures: [{}])",
        joined(.rollback_failures)
    )]
    CommitFailed {
        subsystem: String,
        #[source]
        source: SubsystemError,
        /// Subsystems that committed before the failure, in order.
        committed: Vec<String>,
        /// Subsystems rolled back afterwards, in rollback order.
        rolled_back: Vec<String>,
        /// Rollbacks that themselves failed.
        rollback_failures: Vec<SubsystemError>,
    },

    /// The operation is not legal in the transaction's current state.
    #[error("transaction is {state}, cannot {operation}")]
    InvalidState {
        state: TransactionState,
        operation: &'static str,
    },

    /// The admission check inside the critical section refused the change.
    #[error("transaction refused: {0}")]
    Refused(RpcError),

    /// The datastore lock could not be taken.
    #[error("datastore lock unavailable: {0}")]
    Lock(#[from] LockError),
}

fn joined(errors: &[SubsystemError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl CoordinationError {
    /// Protocol form of the error for an `rpc-reply`.
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::PreCommit(source) => source.to_rpc_error(),
            Self::CommitFailed {
                source,
                committed,
                rolled_back,
                rollback_failures,
                ..
            } => {
                let error = if !rolled_back.is_empty() || committed.is_empty() {
                    RpcError::operation_failed(self.to_string())
                } else {
                    RpcError::new(
                        shared_types::ErrorType::Application,
                        shared_types::ErrorTag::PartialOperation,
                        self.to_string(),
                    )
                };
                error.with_app_tag(source.subsystem.clone()).with_info(serde_json::json!({
                    "committed": committed,
                    "rolled-back": rolled_back,
                    "rollback-failures": rollback_failures
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>(),
                }))
            }
            Self::InvalidState { .. } => RpcError::operation_failed(self.to_string()),
            Self::Refused(error) => error.clone(),
            Self::Lock(LockError::Timeout(_)) => RpcError::in_use(self.to_string()),
            Self::Lock(_) => RpcError::operation_failed(self.to_string()),
        }
    }
}
