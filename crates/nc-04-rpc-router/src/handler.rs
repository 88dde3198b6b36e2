//! # Handler Contract
//!
//! Two kinds of handler exist:
//!
//! - `RpcHandler` returns one reply plus side-channel notifications.
//! - `StreamingRpcHandler` gets the session's outbound channel instead and
//!   must write at least one acknowledgement on it before returning `Ok`.
//!   `create-subscription` is the canonical example.
//!
//! In both, `validate` runs before `execute` and a validation failure means
//! `execute` is never called.

use async_trait::async_trait;
use nc_03_session::{Session, SessionChannel};
use shared_types::{Notification, ReplyBody, RpcError, RpcRequest};
use std::sync::Arc;

/// What a unary handler produced.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutput {
    pub reply: ReplyBody,
    /// Published to the notification sink after the reply is produced.
    pub notifications: Vec<Notification>,
    /// Close the calling session once the reply has been queued.
    pub close_session: bool,
}

impl HandlerOutput {
    pub fn ok() -> Self {
        Self::with_body(ReplyBody::Ok)
    }

    pub fn data(data: serde_json::Value) -> Self {
        Self::with_body(ReplyBody::Data(data))
    }

    fn with_body(reply: ReplyBody) -> Self {
        Self {
            reply,
            notifications: Vec::new(),
            close_session: false,
        }
    }

    #[must_use]
    pub fn notify(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    #[must_use]
    pub fn then_close_session(mut self) -> Self {
        self.close_session = true;
        self
    }
}

#[async_trait]
pub trait RpcHandler: Send + Sync {
    /// Capabilities the session must have negotiated.
    fn required_capabilities(&self) -> &[&'static str] {
        &[]
    }

    /// Reject semantically invalid input. Must not have side effects.
    fn validate(&self, _request: &RpcRequest, _session: &Session) -> Result<(), RpcError> {
        Ok(())
    }

    async fn execute(
        &self,
        request: &RpcRequest,
        session: &Arc<Session>,
    ) -> Result<HandlerOutput, RpcError>;
}

#[async_trait]
pub trait StreamingRpcHandler: Send + Sync {
    fn required_capabilities(&self) -> &[&'static str] {
        &[]
    }

    fn validate(&self, _request: &RpcRequest, _session: &Session) -> Result<(), RpcError> {
        Ok(())
    }

    /// Write the acknowledgement on `channel`, then start streaming.
    ///
    /// On `Err` the router writes the error reply; the handler must not have
    /// written anything in that case.
    async fn execute(
        &self,
        request: &RpcRequest,
        session: &Arc<Session>,
        channel: &SessionChannel,
    ) -> Result<(), RpcError>;
}
