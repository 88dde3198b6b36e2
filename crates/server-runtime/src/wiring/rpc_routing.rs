//! Registers every built-in handler with the router.

use crate::adapters::ConfigStore;
use crate::container::ServerConfig;
use crate::handlers::{
    CloseSessionHandler, EditConfigHandler, GetConfigHandler, KillSessionHandler, LockHandler,
    UnlockHandler,
};
use nc_01_keyed_lock::KeyedLockManager;
use nc_03_session::SessionManager;
use nc_04_rpc_router::{RegistrationError, RpcRouter};
use nc_05_subsystem_coordinator::CompositeSubsystem;
use nc_06_notifications::{CreateSubscriptionHandler, NotificationPipeline};
use shared_types::{Datastore, OperationName};
use std::sync::Arc;

pub fn build_router(
    config: &ServerConfig,
    locks: &Arc<KeyedLockManager<Datastore>>,
    commit_locks: &Arc<KeyedLockManager<Datastore>>,
    sessions: &Arc<SessionManager>,
    coordinator: &Arc<CompositeSubsystem>,
    store: &Arc<ConfigStore>,
    notifications: &Arc<NotificationPipeline>,
) -> Result<RpcRouter, RegistrationError> {
    let router = RpcRouter::builder()
        .notification_sink(notifications.clone())
        .register(OperationName::base("close-session"), Arc::new(CloseSessionHandler))?
        .register(
            OperationName::base("kill-session"),
            Arc::new(KillSessionHandler::new(Arc::clone(sessions))),
        )?
        .register(
            OperationName::base("lock"),
            Arc::new(LockHandler::new(
                Arc::clone(locks),
                Arc::clone(commit_locks),
                config.locks.acquire_timeout,
            )),
        )?
        .register(
            OperationName::base("unlock"),
            Arc::new(UnlockHandler::new(Arc::clone(locks))),
        )?
        .register(
            OperationName::base("edit-config"),
            Arc::new(EditConfigHandler::new(
                Arc::clone(coordinator),
                Arc::clone(locks),
                Arc::clone(commit_locks),
                config.locks.acquire_timeout,
            )),
        )?
        .register(
            OperationName::base("get-config"),
            Arc::new(GetConfigHandler::new(Arc::clone(store))),
        )?
        .register_streaming(
            OperationName::create_subscription(),
            Arc::new(CreateSubscriptionHandler::new(Arc::clone(notifications))),
        )?
        .build();
    Ok(router)
}
