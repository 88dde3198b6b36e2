//! `close-session` and `kill-session`.

use async_trait::async_trait;
use nc_03_session::{Session, SessionError, SessionManager};
use nc_04_rpc_router::{HandlerOutput, RpcHandler};
use shared_types::{RpcError, RpcRequest, SessionId};
use std::sync::Arc;
use tracing::info;

/// Replies `<ok/>`, then the serve loop closes the calling session.
#[derive(Debug, Default)]
pub struct CloseSessionHandler;

#[async_trait]
impl RpcHandler for CloseSessionHandler {
    async fn execute(
        &self,
        _request: &RpcRequest,
        session: &Arc<Session>,
    ) -> Result<HandlerOutput, RpcError> {
        info!(session_id = %session.id(), "[Runtime] close-session requested");
        Ok(HandlerOutput::ok().then_close_session())
    }
}

/// Terminates another session after letting its in-flight requests drain.
pub struct KillSessionHandler {
    manager: Arc<SessionManager>,
}

impl KillSessionHandler {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    fn target(request: &RpcRequest) -> Result<SessionId, RpcError> {
        request.required::<u32>("session-id").map(SessionId)
    }
}

#[async_trait]
impl RpcHandler for KillSessionHandler {
    fn validate(&self, request: &RpcRequest, session: &Session) -> Result<(), RpcError> {
        let target = Self::target(request)?;
        if target == session.id() {
            return Err(RpcError::invalid_value("a session cannot kill itself; use close-session")
                .with_path("session-id"));
        }
        Ok(())
    }

    async fn execute(
        &self,
        request: &RpcRequest,
        session: &Arc<Session>,
    ) -> Result<HandlerOutput, RpcError> {
        let target = Self::target(request)?;
        match self.manager.kill_session(target, true).await {
            Ok(()) => {
                info!(session_id = %session.id(), target = %target, "[Runtime] session killed");
                Ok(HandlerOutput::ok())
            }
            Err(SessionError::UnknownSession(id)) => {
                Err(RpcError::invalid_value(format!("no session with id {id}")).with_path("session-id"))
            }
            Err(e) => Err(RpcError::operation_failed(e.to_string())),
        }
    }
}
