//! `lock` and `unlock`.
//!
//! Datastore locks live in the `<lock>` table with the session as owner.
//! `edit-config` consults that table inside its own commit section and refuses
//! every session but the holder until `unlock` or session teardown. A lock is
//! granted only between commits: `lock` briefly takes the datastore's commit
//! key itself, so it never lands in the middle of an edit.

use super::{holder_session, target_datastore};
use async_trait::async_trait;
use nc_01_keyed_lock::{KeyedLockManager, LockError, OwnerId};
use nc_03_session::Session;
use nc_04_rpc_router::{HandlerOutput, RpcHandler};
use shared_types::{Datastore, RpcError, RpcRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct LockHandler {
    locks: Arc<KeyedLockManager<Datastore>>,
    commit_locks: Arc<KeyedLockManager<Datastore>>,
    acquire_timeout: Duration,
}

impl LockHandler {
    pub fn new(
        locks: Arc<KeyedLockManager<Datastore>>,
        commit_locks: Arc<KeyedLockManager<Datastore>>,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            locks,
            commit_locks,
            acquire_timeout,
        }
    }
}

#[async_trait]
impl RpcHandler for LockHandler {
    fn validate(&self, request: &RpcRequest, session: &Session) -> Result<(), RpcError> {
        target_datastore(request, session).map(|_| ())
    }

    async fn execute(
        &self,
        request: &RpcRequest,
        session: &Arc<Session>,
    ) -> Result<HandlerOutput, RpcError> {
        let datastore = target_datastore(request, session)?;
        let owner = OwnerId::Session(session.id());

        // Wait out any edit in flight on this datastore.
        let _commit = self
            .commit_locks
            .lock_timeout(datastore, self.commit_locks.task_owner(), self.acquire_timeout)
            .await
            .map_err(|e| {
                debug!(session_id = %session.id(), %datastore, error = %e, "[Runtime] lock denied");
                RpcError::in_use(format!("an edit of the {datastore} datastore is in progress"))
            })?;

        // A second <lock> from the holder is refused like any other.
        if let Some(holder) = self.locks.holder(&datastore) {
            debug!(session_id = %session.id(), %datastore, %holder, "[Runtime] lock denied");
            return Err(RpcError::lock_denied(holder_session(holder)));
        }
        if !self.locks.try_acquire(datastore, owner) {
            let holder = self.locks.holder(&datastore).map_or(0, |h| holder_session(h).0);
            return Err(RpcError::lock_denied(holder));
        }

        info!(session_id = %session.id(), %datastore, "[Runtime] datastore locked");
        Ok(HandlerOutput::ok())
    }
}

pub struct UnlockHandler {
    locks: Arc<KeyedLockManager<Datastore>>,
}

impl UnlockHandler {
    pub fn new(locks: Arc<KeyedLockManager<Datastore>>) -> Self {
        Self { locks }
    }
}

#[async_trait]
impl RpcHandler for UnlockHandler {
    fn validate(&self, request: &RpcRequest, session: &Session) -> Result<(), RpcError> {
        target_datastore(request, session).map(|_| ())
    }

    async fn execute(
        &self,
        request: &RpcRequest,
        session: &Arc<Session>,
    ) -> Result<HandlerOutput, RpcError> {
        let datastore = target_datastore(request, session)?;
        match self.locks.release(&datastore, OwnerId::Session(session.id())) {
            Ok(()) => {
                info!(session_id = %session.id(), %datastore, "[Runtime] datastore unlocked");
                Ok(HandlerOutput::ok())
            }
            Err(LockError::NotLocked) => Err(RpcError::operation_failed(format!(
                "the {datastore} datastore is not locked"
            ))),
            Err(LockError::NotHolder { holder, .. }) => Err(RpcError::operation_failed(format!(
                "the {datastore} datastore is locked by session {}",
                holder_session(holder)
            ))
            .with_info(serde_json::json!({ "session-id": holder_session(holder).to_string() }))),
            Err(e) => Err(RpcError::operation_failed(e.to_string())),
        }
    }
}
