//! # Component Container
//!
//! ## Construction Order
//!
//! ```text
//! Level 0: Keyed locks, user gateway, notification pipeline
//! Level 1: Session manager (gateway), coordinator + config store
//! Level 2: Lifecycle listeners (locks, pipeline, metrics → session manager)
//! Level 3: RPC router (every component above), worker pool
//! ```
//!
//! Must be built inside a Tokio runtime: the notification dispatcher is
//! spawned during construction.

use crate::adapters::{ConfigStore, LockReleaseListener, SessionMetricsListener};
use crate::container::config::{ConfigError, ServerConfig};
use crate::wiring::build_router;
use nc_01_keyed_lock::KeyedLockManager;
use nc_02_authentication::{AuthError, StaticUserGateway};
use nc_03_session::SessionManager;
use nc_04_rpc_router::{RegistrationError, RpcRouter, SessionServer, WorkerPool};
use nc_05_subsystem_coordinator::CompositeSubsystem;
use nc_06_notifications::{
    InMemoryModuleCatalog, ModuleInfo, NotificationPipeline, YangLibraryChangeNotifier,
    YANG_LIBRARY_NAMESPACE,
};
use parking_lot::Mutex;
use shared_types::Datastore;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

/// Failure to assemble the server.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid user database: {0}")]
    Auth(#[from] AuthError),

    #[error("handler registration failed: {0}")]
    Registration(#[from] RegistrationError),
}

pub struct ServerContainer {
    pub config: ServerConfig,

    // =========================================================================
    // LEVEL 0
    // =========================================================================
    /// `<lock>` ownership, one session per datastore.
    pub locks: Arc<KeyedLockManager<Datastore>>,
    /// Commit sections; every `edit-config` takes its datastore's key here
    /// under a task owner of its own.
    pub commit_locks: Arc<KeyedLockManager<Datastore>>,
    pub gateway: Arc<StaticUserGateway>,
    pub notifications: Arc<NotificationPipeline>,

    // =========================================================================
    // LEVEL 1
    // =========================================================================
    pub sessions: Arc<SessionManager>,
    pub coordinator: Arc<CompositeSubsystem>,
    pub config_store: Arc<ConfigStore>,
    pub catalog: Arc<InMemoryModuleCatalog>,
    pub yang_library: YangLibraryChangeNotifier,

    // =========================================================================
    // LEVEL 3
    // =========================================================================
    pub router: Arc<RpcRouter>,
    pub pool: WorkerPool,

    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ServerContainer {
    #[instrument(skip_all, name = "container_init")]
    pub fn new(config: ServerConfig) -> Result<Self, ContainerError> {
        config.validate()?;

        let locks = Arc::new(KeyedLockManager::exclusive());
        let commit_locks = Arc::new(KeyedLockManager::exclusive());
        let gateway = Arc::new(StaticUserGateway::new(config.auth.users.clone())?);
        let (notifications, dispatcher) = NotificationPipeline::spawn(config.notifications.clone());
        info!(
            users = config.auth.users.len(),
            queue_capacity = config.notifications.queue_capacity,
            "[Container] level 0 ready"
        );

        let sessions = SessionManager::new(config.session.clone(), gateway.clone());
        let coordinator = Arc::new(CompositeSubsystem::new(config.coordinator.clone()));
        let config_store = Arc::new(ConfigStore::new("config-store"));
        coordinator.register(config_store.clone());
        let catalog = Arc::new(InMemoryModuleCatalog::new(vec![ModuleInfo::new(
            "ietf-yang-library",
            "2019-01-04",
            YANG_LIBRARY_NAMESPACE,
        )]));
        let yang_library = YangLibraryChangeNotifier::new(catalog.clone(), notifications.clone());
        info!(
            participants = ?coordinator.subsystem_names(),
            "[Container] level 1 ready"
        );

        sessions.add_listener(Arc::new(LockReleaseListener::new(Arc::clone(&locks))));
        sessions.add_listener(notifications.clone());
        sessions.add_listener(Arc::new(SessionMetricsListener));

        let router = Arc::new(build_router(
            &config,
            &locks,
            &commit_locks,
            &sessions,
            &coordinator,
            &config_store,
            &notifications,
        )?);
        let pool = WorkerPool::new(config.router.workers);
        info!(
            operations = router.operations().count(),
            workers = pool.size(),
            "[Container] router ready"
        );

        Ok(Self {
            config,
            locks,
            commit_locks,
            gateway,
            notifications,
            sessions,
            coordinator,
            config_store,
            catalog,
            yang_library,
            router,
            pool,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    /// A serve loop bound to this container's router and pool.
    pub fn session_server(&self) -> SessionServer {
        SessionServer::new(
            Arc::clone(&self.router),
            Arc::clone(&self.sessions),
            self.pool.clone(),
        )
    }

    /// Close every session and stop accepting handler work.
    pub async fn shutdown(&self) {
        let closed = self.sessions.shutdown_all().await;
        self.pool.close();
        if let Some(dispatcher) = self.dispatcher.lock().take() {
            dispatcher.abort();
        }
        info!(closed, "[Container] shut down");
    }
}
