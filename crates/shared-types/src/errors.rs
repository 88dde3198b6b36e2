//! # Error Types
//!
//! The structured `rpc-error` every protocol-visible failure is reported as.
//!
//! Tags and layers follow RFC 6241 Appendix A. Validation and protocol
//! failures are recovered locally into an `RpcError` and sent back to the
//! client; they never abort the connection.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Conceptual layer the error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    /// Secure transport layer.
    Transport,
    /// Messages layer (framing, message-id, unknown operation).
    Rpc,
    /// Operations layer.
    Protocol,
    /// Content layer (handler or subsystem rejected the data).
    Application,
}

/// The `error-tag` enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorTag {
    InUse,
    InvalidValue,
    TooBig,
    MissingAttribute,
    BadAttribute,
    UnknownAttribute,
    MissingElement,
    BadElement,
    UnknownElement,
    UnknownNamespace,
    AccessDenied,
    LockDenied,
    ResourceDenied,
    RollbackFailed,
    DataExists,
    DataMissing,
    OperationNotSupported,
    OperationFailed,
    PartialOperation,
    MalformedMessage,
}

impl ErrorTag {
    /// Wire name of the tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InUse => "in-use",
            Self::InvalidValue => "invalid-value",
            Self::TooBig => "too-big",
            Self::MissingAttribute => "missing-attribute",
            Self::BadAttribute => "bad-attribute",
            Self::UnknownAttribute => "unknown-attribute",
            Self::MissingElement => "missing-element",
            Self::BadElement => "bad-element",
            Self::UnknownElement => "unknown-element",
            Self::UnknownNamespace => "unknown-namespace",
            Self::AccessDenied => "access-denied",
            Self::LockDenied => "lock-denied",
            Self::ResourceDenied => "resource-denied",
            Self::RollbackFailed => "rollback-failed",
            Self::DataExists => "data-exists",
            Self::DataMissing => "data-missing",
            Self::OperationNotSupported => "operation-not-supported",
            Self::OperationFailed => "operation-failed",
            Self::PartialOperation => "partial-operation",
            Self::MalformedMessage => "malformed-message",
        }
    }

    /// Tags that say "the request was wrong" rather than "the server broke".
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidValue
                | Self::TooBig
                | Self::MissingAttribute
                | Self::BadAttribute
                | Self::UnknownAttribute
                | Self::MissingElement
                | Self::BadElement
                | Self::UnknownElement
                | Self::UnknownNamespace
                | Self::DataExists
                | Self::DataMissing
        )
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Error,
    Warning,
}

/// A structured `rpc-error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Layer the error occurred in.
    pub error_type: ErrorType,
    /// Error tag.
    pub error_tag: ErrorTag,
    /// Severity.
    pub severity: ErrorSeverity,
    /// Implementation-specific tag refining `error_tag`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_tag: Option<String>,
    /// Location of the offending node in the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Tag-specific details (e.g. the lock holder's session id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,
}

impl RpcError {
    /// Create an error with severity `error`.
    pub fn new(error_type: ErrorType, error_tag: ErrorTag, message: impl Into<String>) -> Self {
        Self {
            error_type,
            error_tag,
            severity: ErrorSeverity::Error,
            app_tag: None,
            path: None,
            message: message.into(),
            info: None,
        }
    }

    /// Attach an app tag.
    #[must_use]
    pub fn with_app_tag(mut self, app_tag: impl Into<String>) -> Self {
        self.app_tag = Some(app_tag.into());
        self
    }

    /// Attach a payload path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach structured info.
    #[must_use]
    pub fn with_info(mut self, info: serde_json::Value) -> Self {
        self.info = Some(info);
        self
    }

    // Protocol errors

    /// No handler exists for the operation.
    pub fn operation_not_supported(operation: impl fmt::Display) -> Self {
        Self::new(
            ErrorType::Protocol,
            ErrorTag::OperationNotSupported,
            format!("Operation not supported: {}", operation),
        )
    }

    /// Operation requires a capability the session did not negotiate.
    pub fn capability_mismatch(operation: impl fmt::Display, capability: &str) -> Self {
        Self::new(
            ErrorType::Protocol,
            ErrorTag::OperationNotSupported,
            format!(
                "Operation {} requires capability {} which was not negotiated",
                operation, capability
            ),
        )
        .with_info(serde_json::json!({ "missing-capability": capability }))
    }

    /// The message could not be understood at all.
    pub fn malformed_message(details: impl Into<String>) -> Self {
        Self::new(
            ErrorType::Rpc,
            ErrorTag::MalformedMessage,
            format!("Malformed message: {}", details.into()),
        )
    }

    // Validation errors

    /// A value in the input is not acceptable.
    pub fn invalid_value(details: impl Into<String>) -> Self {
        Self::new(ErrorType::Application, ErrorTag::InvalidValue, details)
    }

    /// A required input element is absent.
    pub fn missing_element(element: &str) -> Self {
        Self::new(
            ErrorType::Protocol,
            ErrorTag::MissingElement,
            format!("Missing element: {}", element),
        )
        .with_info(serde_json::json!({ "bad-element": element }))
    }

    /// An input element is present but malformed.
    pub fn bad_element(element: &str, details: impl Into<String>) -> Self {
        Self::new(
            ErrorType::Protocol,
            ErrorTag::BadElement,
            format!("Bad element {}: {}", element, details.into()),
        )
        .with_info(serde_json::json!({ "bad-element": element }))
    }

    // Resource errors

    /// The resource is locked by another session.
    pub fn lock_denied(holder: impl fmt::Display) -> Self {
        Self::new(
            ErrorType::Protocol,
            ErrorTag::LockDenied,
            format!("Lock is already held by session {}", holder),
        )
        .with_info(serde_json::json!({ "session-id": holder.to_string() }))
    }

    /// The resource is in use by another session.
    pub fn in_use(details: impl Into<String>) -> Self {
        Self::new(ErrorType::Protocol, ErrorTag::InUse, details)
    }

    /// The server lacks resources to complete the request.
    pub fn resource_denied(details: impl Into<String>) -> Self {
        Self::new(ErrorType::Protocol, ErrorTag::ResourceDenied, details)
    }

    /// The request could not be completed.
    pub fn operation_failed(details: impl Into<String>) -> Self {
        Self::new(ErrorType::Application, ErrorTag::OperationFailed, details)
    }

    /// Caller is not authorized.
    pub fn access_denied(details: impl Into<String>) -> Self {
        Self::new(ErrorType::Protocol, ErrorTag::AccessDenied, details)
    }

    /// Rollback of a partially applied change failed.
    pub fn rollback_failed(details: impl Into<String>) -> Self {
        Self::new(ErrorType::Application, ErrorTag::RollbackFailed, details)
    }

    /// Whether the caller's input was at fault.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.error_tag.is_validation()
    }

    /// Whether the failure is at the protocol or message layer.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self.error_type, ErrorType::Protocol | ErrorType::Rpc)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error_tag, self.message)
    }
}

impl std::error::Error for RpcError {}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_syntax() || e.is_eof() {
            RpcError::malformed_message(e.to_string())
        } else {
            RpcError::invalid_value(e.to_string())
        }
    }
}

/// Result type for protocol operations.
pub type RpcResult<T> = Result<T, RpcError>;
