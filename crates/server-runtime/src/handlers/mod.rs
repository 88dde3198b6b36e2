//! # Built-in RPC Handlers
//!
//! The NETCONF base operations the runtime provides on top of the engine:
//!
//! | Operation | Handler |
//! |-----------|---------|
//! | `close-session` | `CloseSessionHandler` |
//! | `kill-session` | `KillSessionHandler` |
//! | `lock` / `unlock` | `LockHandler` / `UnlockHandler` |
//! | `edit-config` | `EditConfigHandler` |
//! | `get-config` | `GetConfigHandler` |
//!
//! `create-subscription` lives with the notification pipeline.

pub mod config_ops;
pub mod locking;
pub mod session_ops;

pub use config_ops::{EditConfigHandler, GetConfigHandler, CONFIG_CHANGE_EVENT};
pub use locking::{LockHandler, UnlockHandler};
pub use session_ops::{CloseSessionHandler, KillSessionHandler};

use nc_01_keyed_lock::OwnerId;
use nc_03_session::Session;
use shared_types::{Capability, Datastore, RpcError, RpcRequest, SessionId};

/// Read the `target` element and check the session may address it.
pub(crate) fn target_datastore(request: &RpcRequest, session: &Session) -> Result<Datastore, RpcError> {
    let datastore: Datastore = request.required("target")?;
    if datastore == Datastore::Candidate && !session.supports(Capability::CANDIDATE_1_0) {
        return Err(RpcError::capability_mismatch(
            &request.operation,
            Capability::CANDIDATE_1_0,
        ));
    }
    Ok(datastore)
}

/// Session id reported to clients for a lock holder; zero for holders that
/// are not sessions.
pub(crate) fn holder_session(owner: OwnerId) -> SessionId {
    match owner {
        OwnerId::Session(id) => id,
        OwnerId::Task(_) => SessionId(0),
    }
}
