//! # RPC Messages
//!
//! Requests and replies exchanged on a session.
//!
//! ## Design Rules
//!
//! - Operation names are namespace-qualified; two operations with the same
//!   local name in different namespaces are different operations.
//! - `payload` is opaque to the core.
//! - `sequence` is assigned on arrival and used for diagnostics only.

use crate::entities::SessionId;
use crate::errors::RpcError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace of the NETCONF base operations.
pub const BASE_NAMESPACE: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";

/// Namespace of the event notification operations.
pub const NOTIFICATION_NAMESPACE: &str = "urn:ietf:params:xml:ns:netconf:notification:1.0";

/// A namespace-qualified operation name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperationName {
    /// XML namespace of the operation.
    pub namespace: String,
    /// Local name of the operation.
    pub name: String,
}

impl OperationName {
    /// Create a qualified name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// An operation in the NETCONF base namespace.
    pub fn base(name: impl Into<String>) -> Self {
        Self::new(BASE_NAMESPACE, name)
    }

    /// `create-subscription` in the notification namespace.
    #[must_use]
    pub fn create_subscription() -> Self {
        Self::new(NOTIFICATION_NAMESPACE, "create-subscription")
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.name)
    }
}

/// An incoming RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Client-chosen message id echoed in the reply.
    pub message_id: String,
    /// Operation to invoke.
    pub operation: OperationName,
    /// Operation input.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Session the request arrived on.
    pub session_id: SessionId,
    /// Arrival sequence number on the session.
    #[serde(default)]
    pub sequence: u64,
}

impl RpcRequest {
    /// Look up a top-level input element.
    #[must_use]
    pub fn input(&self, element: &str) -> Option<&serde_json::Value> {
        self.payload.get(element)
    }

    /// Look up and deserialize a required input element.
    pub fn required<T: serde::de::DeserializeOwned>(&self, element: &str) -> Result<T, RpcError> {
        let value = self
            .input(element)
            .ok_or_else(|| RpcError::missing_element(element))?;
        serde_json::from_value(value.clone())
            .map_err(|e| RpcError::bad_element(element, e.to_string()))
    }

    /// Look up and deserialize an optional input element.
    pub fn optional<T: serde::de::DeserializeOwned>(
        &self,
        element: &str,
    ) -> Result<Option<T>, RpcError> {
        match self.input(element) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| RpcError::bad_element(element, e.to_string())),
        }
    }
}

/// Body of an `rpc-reply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "lowercase")]
pub enum ReplyBody {
    /// `<ok/>`.
    Ok,
    /// Reply data.
    Data(serde_json::Value),
    /// One or more `rpc-error` elements.
    Errors(Vec<RpcError>),
}

/// An outgoing `rpc-reply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcReply {
    /// Message id of the request this replies to.
    pub message_id: String,
    /// Reply body.
    pub body: ReplyBody,
}

impl RpcReply {
    /// `<ok/>` reply.
    pub fn ok(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            body: ReplyBody::Ok,
        }
    }

    /// Data reply.
    pub fn data(message_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            message_id: message_id.into(),
            body: ReplyBody::Data(data),
        }
    }

    /// Single error reply.
    pub fn error(message_id: impl Into<String>, error: RpcError) -> Self {
        Self {
            message_id: message_id.into(),
            body: ReplyBody::Errors(vec![error]),
        }
    }

    /// Whether the reply carries errors.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.body, ReplyBody::Errors(_))
    }

    /// The first error, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&RpcError> {
        match &self.body {
            ReplyBody::Errors(errors) => errors.first(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorTag;
    use serde_json::json;

    fn request(payload: serde_json::Value) -> RpcRequest {
        RpcRequest {
            message_id: "101".into(),
            operation: OperationName::base("lock"),
            payload,
            session_id: SessionId(1),
            sequence: 0,
        }
    }

    #[test]
    fn test_operation_name_display() {
        let op = OperationName::base("get-config");
        assert_eq!(
            op.to_string(),
            "{urn:ietf:params:xml:ns:netconf:base:1.0}get-config"
        );
    }

    #[test]
    fn test_same_local_name_different_namespace() {
        assert_ne!(
            OperationName::base("get"),
            OperationName::new("urn:example", "get")
        );
    }

    #[test]
    fn test_required_missing_element() {
        let req = request(json!({}));
        let err = req.required::<String>("target").unwrap_err();
        assert_eq!(err.error_tag, ErrorTag::MissingElement);
    }

    #[test]
    fn test_required_bad_element() {
        let req = request(json!({ "target": 42 }));
        let err = req.required::<String>("target").unwrap_err();
        assert_eq!(err.error_tag, ErrorTag::BadElement);
    }

    #[test]
    fn test_optional_null_is_absent() {
        let req = request(json!({ "filter": null }));
        assert_eq!(req.optional::<String>("filter").unwrap(), None);
    }

    #[test]
    fn test_reply_first_error() {
        let reply = RpcReply::error("7", RpcError::in_use("busy"));
        assert!(reply.is_error());
        assert_eq!(reply.first_error().unwrap().error_tag, ErrorTag::InUse);
        assert!(RpcReply::ok("8").first_error().is_none());
    }
}
