//! # RPC Router
//!
//! Maps a request's qualified operation name to exactly one registered
//! handler and drives it through the request state machine:
//!
//! ```text
//! RECEIVED ──validate ok──→ VALIDATED ──→ EXECUTING ──ok──→ RESPONDED
//!     │                                       │
//!     └── lookup miss / capability / invalid ─┴── error ──→ FAILED
//! ```
//!
//! Every failure becomes a well-formed `rpc-reply` carrying an `RpcError`;
//! nothing here closes the session or panics on bad input.

use crate::handler::{HandlerOutput, RpcHandler, StreamingRpcHandler};
use crate::metrics::RouterMetrics;
use nc_03_session::{Session, SessionChannel};
use shared_types::{
    ErrorTag, ErrorType, Notification, NotificationSink, OperationName, RpcError, RpcReply,
    RpcRequest,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Message returned when a push-style operation reaches a dispatcher that
/// has no outbound channel to give it.
pub const ASYNC_DISPATCH_REQUIRED: &str = "operation requires an async-capable dispatcher";

/// Position of a request in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validated,
    Executing,
    Responded,
    Failed,
}

impl RequestState {
    /// Whether `next` is a legal successor.
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Received, Validated)
                | (Received, Failed)
                | (Validated, Executing)
                | (Executing, Responded)
                | (Executing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Responded | Self::Failed)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Received => "RECEIVED",
            Self::Validated => "VALIDATED",
            Self::Executing => "EXECUTING",
            Self::Responded => "RESPONDED",
            Self::Failed => "FAILED",
        };
        f.write_str(text)
    }
}

/// Result of dispatching one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub state: RequestState,
    /// Reply to send. `None` when a streaming handler already wrote it.
    pub reply: Option<RpcReply>,
    pub close_session: bool,
}

impl Completion {
    fn responded(reply: Option<RpcReply>, close_session: bool) -> Self {
        Self {
            state: RequestState::Responded,
            reply,
            close_session,
        }
    }

    pub(crate) fn failed(message_id: &str, error: RpcError) -> Self {
        Self {
            state: RequestState::Failed,
            reply: Some(RpcReply::error(message_id, error)),
            close_session: false,
        }
    }

    /// The error carried by a failed completion.
    pub fn error(&self) -> Option<&RpcError> {
        self.reply.as_ref().and_then(RpcReply::first_error)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("a handler is already registered for {0}")]
    Duplicate(OperationName),
}

#[derive(Clone)]
enum Registered {
    Unary(Arc<dyn RpcHandler>),
    Streaming(Arc<dyn StreamingRpcHandler>),
}

impl Registered {
    fn required_capabilities(&self) -> &[&'static str] {
        match self {
            Self::Unary(h) => h.required_capabilities(),
            Self::Streaming(h) => h.required_capabilities(),
        }
    }

    fn validate(&self, request: &RpcRequest, session: &Session) -> Result<(), RpcError> {
        match self {
            Self::Unary(h) => h.validate(request, session),
            Self::Streaming(h) => h.validate(request, session),
        }
    }
}

/// Collects handlers at startup. The finished router is immutable.
#[derive(Default)]
pub struct RpcRouterBuilder {
    handlers: HashMap<OperationName, Registered>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl RpcRouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        self,
        operation: OperationName,
        handler: Arc<dyn RpcHandler>,
    ) -> Result<Self, RegistrationError> {
        self.insert(operation, Registered::Unary(handler))
    }

    pub fn register_streaming(
        self,
        operation: OperationName,
        handler: Arc<dyn StreamingRpcHandler>,
    ) -> Result<Self, RegistrationError> {
        self.insert(operation, Registered::Streaming(handler))
    }

    /// Where side-channel notifications from handlers go.
    #[must_use]
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> RpcRouter {
        RpcRouter {
            handlers: self.handlers,
            sink: self.sink,
            metrics: Arc::new(RouterMetrics::new()),
        }
    }

    fn insert(mut self, operation: OperationName, handler: Registered) -> Result<Self, RegistrationError> {
        if self.handlers.contains_key(&operation) {
            return Err(RegistrationError::Duplicate(operation));
        }
        self.handlers.insert(operation, handler);
        Ok(self)
    }
}

pub struct RpcRouter {
    handlers: HashMap<OperationName, Registered>,
    sink: Option<Arc<dyn NotificationSink>>,
    metrics: Arc<RouterMetrics>,
}

impl RpcRouter {
    pub fn builder() -> RpcRouterBuilder {
        RpcRouterBuilder::new()
    }

    pub fn metrics(&self) -> &Arc<RouterMetrics> {
        &self.metrics
    }

    pub fn is_registered(&self, operation: &OperationName) -> bool {
        self.handlers.contains_key(operation)
    }

    /// Whether the operation writes its own replies on the session channel.
    pub fn is_streaming(&self, operation: &OperationName) -> bool {
        matches!(self.handlers.get(operation), Some(Registered::Streaming(_)))
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationName> {
        self.handlers.keys()
    }

    /// Dispatch without an outbound channel.
    ///
    /// Streaming operations fail with `ASYNC_DISPATCH_REQUIRED`.
    pub async fn dispatch(&self, request: &RpcRequest, session: &Arc<Session>) -> Completion {
        self.dispatch_inner(request, session, None).await
    }

    /// Dispatch with the session's outbound channel available to streaming
    /// handlers.
    pub async fn dispatch_with_channel(
        &self,
        request: &RpcRequest,
        session: &Arc<Session>,
    ) -> Completion {
        self.dispatch_inner(request, session, Some(session.channel()))
            .await
    }

    async fn dispatch_inner(
        &self,
        request: &RpcRequest,
        session: &Arc<Session>,
        channel: Option<&SessionChannel>,
    ) -> Completion {
        self.metrics.record_received();
        let mut tracker = Tracker::new(request);

        let Some(handler) = self.handlers.get(&request.operation) else {
            self.metrics.record_not_supported();
            let error = if channel.is_none() && request.operation == OperationName::create_subscription() {
                async_dispatch_required(&request.operation)
            } else {
                RpcError::operation_not_supported(&request.operation)
            };
            return tracker.fail(&request.message_id, error);
        };

        if let Some(missing) = handler
            .required_capabilities()
            .iter()
            .find(|cap| !session.supports(cap))
        {
            self.metrics.record_not_supported();
            return tracker.fail(
                &request.message_id,
                RpcError::capability_mismatch(&request.operation, missing),
            );
        }

        if let Err(error) = handler.validate(request, session) {
            self.metrics.record_validation_failed();
            return tracker.fail(&request.message_id, error);
        }
        tracker.advance(RequestState::Validated);
        tracker.advance(RequestState::Executing);

        match handler {
            Registered::Unary(handler) => match handler.execute(request, session).await {
                Ok(HandlerOutput {
                    reply,
                    notifications,
                    close_session,
                }) => {
                    self.publish(notifications);
                    self.metrics.record_responded();
                    tracker.advance(RequestState::Responded);
                    Completion::responded(
                        Some(RpcReply {
                            message_id: request.message_id.clone(),
                            body: reply,
                        }),
                        close_session,
                    )
                }
                Err(error) => {
                    self.metrics.record_failed();
                    tracker.fail(&request.message_id, error)
                }
            },
            Registered::Streaming(handler) => {
                let Some(channel) = channel else {
                    self.metrics.record_failed();
                    return tracker.fail(
                        &request.message_id,
                        async_dispatch_required(&request.operation),
                    );
                };
                match handler.execute(request, session, channel).await {
                    Ok(()) => {
                        self.metrics.record_responded();
                        tracker.advance(RequestState::Responded);
                        Completion::responded(None, false)
                    }
                    Err(error) => {
                        self.metrics.record_failed();
                        tracker.fail(&request.message_id, error)
                    }
                }
            }
        }
    }

    fn publish(&self, notifications: Vec<Notification>) {
        if notifications.is_empty() {
            return;
        }
        match &self.sink {
            Some(sink) => notifications.into_iter().for_each(|n| sink.publish(n)),
            None => warn!(
                dropped = notifications.len(),
                "[Router] handler emitted notifications but no sink is configured"
            ),
        }
    }
}

fn async_dispatch_required(operation: &OperationName) -> RpcError {
    RpcError::new(
        ErrorType::Protocol,
        ErrorTag::OperationNotSupported,
        ASYNC_DISPATCH_REQUIRED,
    )
    .with_app_tag("async-dispatch-required")
    .with_info(serde_json::json!({ "operation": operation.to_string() }))
}

/// Follows one request through the state machine for logging.
struct Tracker<'a> {
    request: &'a RpcRequest,
    state: RequestState,
}

impl<'a> Tracker<'a> {
    fn new(request: &'a RpcRequest) -> Self {
        debug!(
            session_id = %request.session_id,
            sequence = request.sequence,
            operation = %request.operation,
            "[Router] RECEIVED"
        );
        Self {
            request,
            state: RequestState::Received,
        }
    }

    fn advance(&mut self, next: RequestState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
        debug!(
            session_id = %self.request.session_id,
            sequence = self.request.sequence,
            "[Router] {}",
            next
        );
    }

    fn fail(mut self, message_id: &str, error: RpcError) -> Completion {
        self.advance(RequestState::Failed);
        debug!(
            session_id = %self.request.session_id,
            sequence = self.request.sequence,
            operation = %self.request.operation,
            error = %error,
            "[Router] request failed"
        );
        Completion::failed(message_id, error)
    }
}
