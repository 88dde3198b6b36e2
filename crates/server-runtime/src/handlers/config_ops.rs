//! `edit-config` and `get-config`.

use super::{holder_session, target_datastore};
use crate::adapters::ConfigStore;
use async_trait::async_trait;
use nc_01_keyed_lock::{KeyedLockManager, OwnerId};
use nc_03_session::Session;
use nc_04_rpc_router::{HandlerOutput, RpcHandler};
use nc_05_subsystem_coordinator::{CompositeSubsystem, CoordinationError};
use serde_json::json;
use shared_types::{
    Capability, Change, ChangeSet, Datastore, Notification, RpcError, RpcRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Event type emitted after every successful `edit-config`.
pub const CONFIG_CHANGE_EVENT: &str = "netconf-config-change";

/// Applies a change set to a datastore through the coordinator.
///
/// Every edit runs in a commit section of its own: the datastore key in the
/// exclusive `commit_locks` table, taken by a fresh task owner. Edits on one
/// datastore therefore never overlap, even from the same session. The
/// `<lock>` table is only consulted, inside that section, to refuse edits
/// while another session holds the datastore.
pub struct EditConfigHandler {
    coordinator: Arc<CompositeSubsystem>,
    locks: Arc<KeyedLockManager<Datastore>>,
    commit_locks: Arc<KeyedLockManager<Datastore>>,
    acquire_timeout: Duration,
}

impl EditConfigHandler {
    pub fn new(
        coordinator: Arc<CompositeSubsystem>,
        locks: Arc<KeyedLockManager<Datastore>>,
        commit_locks: Arc<KeyedLockManager<Datastore>>,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            locks,
            commit_locks,
            acquire_timeout,
        }
    }

    fn writable_target(request: &RpcRequest, session: &Session) -> Result<Datastore, RpcError> {
        let datastore = target_datastore(request, session)?;
        match datastore {
            Datastore::Running if !session.supports(Capability::WRITABLE_RUNNING_1_0) => {
                Err(RpcError::capability_mismatch(
                    &request.operation,
                    Capability::WRITABLE_RUNNING_1_0,
                ))
            }
            Datastore::Startup => Err(RpcError::invalid_value(
                "the startup datastore cannot be edited directly",
            )
            .with_path("target")),
            _ => Ok(datastore),
        }
    }
}

#[async_trait]
impl RpcHandler for EditConfigHandler {
    fn validate(&self, request: &RpcRequest, session: &Session) -> Result<(), RpcError> {
        Self::writable_target(request, session)?;
        request.required::<Vec<Change>>("changes")?;
        Ok(())
    }

    async fn execute(
        &self,
        request: &RpcRequest,
        session: &Arc<Session>,
    ) -> Result<HandlerOutput, RpcError> {
        let datastore = Self::writable_target(request, session)?;
        let changes: Vec<Change> = request.required("changes")?;
        let session_owner = OwnerId::Session(session.id());
        let locks = &self.locks;
        let admit = move || match locks.holder(&datastore) {
            Some(holder) if holder != session_owner => Err(RpcError::in_use(format!(
                "the {datastore} datastore is locked by session {}",
                holder_session(holder)
            ))
            .with_info(json!({ "session-id": holder_session(holder).to_string() }))),
            _ => Ok(()),
        };

        let edits: Vec<serde_json::Value> = changes
            .iter()
            .map(|c| json!({ "target": c.path, "operation": c.operation }))
            .collect();
        let change_set = ChangeSet::builder(datastore)
            .origin(session.id())
            .extend(changes)
            .build();

        let result = self
            .coordinator
            .apply_exclusive(
                Arc::clone(&change_set),
                &self.commit_locks,
                self.commit_locks.task_owner(),
                self.acquire_timeout,
                admit,
            )
            .await;

        if let Err(e) = result {
            match &e {
                CoordinationError::PreCommit(_) | CoordinationError::Refused(_) => debug!(
                    session_id = %session.id(),
                    change_set = %change_set.id(),
                    error = %e,
                    "[Runtime] edit-config rejected"
                ),
                _ => error!(
                    session_id = %session.id(),
                    change_set = %change_set.id(),
                    error = ?e,
                    "[Runtime] edit-config failed"
                ),
            }
            return Err(e.to_rpc_error());
        }

        info!(
            session_id = %session.id(),
            %datastore,
            changes = change_set.len(),
            "[Runtime] configuration changed"
        );

        let notification = Notification::new(
            CONFIG_CHANGE_EVENT,
            json!({
                "datastore": datastore,
                "changed-by": {
                    "username": session.identity().as_str(),
                    "session-id": session.id(),
                },
                "edit": edits,
            }),
            session.identity().clone(),
        );
        Ok(HandlerOutput::ok().notify(notification))
    }
}

/// Returns the contents of a datastore.
pub struct GetConfigHandler {
    store: Arc<ConfigStore>,
}

impl GetConfigHandler {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RpcHandler for GetConfigHandler {
    fn validate(&self, request: &RpcRequest, session: &Session) -> Result<(), RpcError> {
        target_datastore(request, session).map(|_| ())
    }

    async fn execute(
        &self,
        request: &RpcRequest,
        session: &Arc<Session>,
    ) -> Result<HandlerOutput, RpcError> {
        let datastore = target_datastore(request, session)?;
        Ok(HandlerOutput::data(self.store.contents(datastore)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::fixtures::{base_only_session, request, session};
    use nc_05_subsystem_coordinator::{CoordinatorConfig, Subsystem, SubsystemError};
    use shared_types::{ErrorTag, ReplyBody, SessionId};

    struct Rejecting;

    #[async_trait]
    impl Subsystem for Rejecting {
        fn name(&self) -> &str {
            "acl"
        }

        async fn pre_commit(&self, _change_set: &ChangeSet) -> Result<(), SubsystemError> {
            Err(SubsystemError::validation("acl", "rule 7 conflicts"))
        }

        async fn commit(&self, _change_set: &ChangeSet) -> Result<(), SubsystemError> {
            Ok(())
        }
    }

    /// Holds every transaction between pre-commit and commit for a while.
    struct Slow;

    #[async_trait]
    impl Subsystem for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn pre_commit(&self, _change_set: &ChangeSet) -> Result<(), SubsystemError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }

        async fn commit(&self, _change_set: &ChangeSet) -> Result<(), SubsystemError> {
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<ConfigStore>,
        coordinator: Arc<CompositeSubsystem>,
        locks: Arc<KeyedLockManager<Datastore>>,
        commit_locks: Arc<KeyedLockManager<Datastore>>,
        edit: EditConfigHandler,
        get: GetConfigHandler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(ConfigStore::new("config"));
        let coordinator = Arc::new(CompositeSubsystem::new(CoordinatorConfig::default()));
        coordinator.register(store.clone());
        let locks = Arc::new(KeyedLockManager::exclusive());
        let commit_locks = Arc::new(KeyedLockManager::exclusive());
        Fixture {
            edit: EditConfigHandler::new(
                Arc::clone(&coordinator),
                Arc::clone(&locks),
                Arc::clone(&commit_locks),
                Duration::from_secs(2),
            ),
            get: GetConfigHandler::new(Arc::clone(&store)),
            store,
            coordinator,
            locks,
            commit_locks,
        }
    }

    fn hostname_edit(value: &str) -> serde_json::Value {
        json!({
            "target": "running",
            "changes": [
                { "path": "/system/hostname", "operation": "replace", "value": value }
            ]
        })
    }

    #[tokio::test]
    async fn test_edit_commits_and_notifies() {
        let f = fixture();
        let (s1, _rx) = session(1);

        let output = f
            .edit
            .execute(&request(&s1, "edit-config", hostname_edit("r1")), &s1)
            .await
            .unwrap();

        assert_eq!(output.reply, ReplyBody::Ok);
        assert_eq!(output.notifications.len(), 1);
        let event = &output.notifications[0];
        assert_eq!(event.event_type, CONFIG_CHANGE_EVENT);
        assert_eq!(event.body["changed-by"]["session-id"], json!(1));
        assert_eq!(event.body["edit"][0]["operation"], json!("replace"));

        assert_eq!(f.store.get(Datastore::Running, "/system/hostname"), Some(json!("r1")));
        // The commit section is released.
        assert!(f.commit_locks.is_empty());
        assert!(f.locks.is_empty());
    }

    #[tokio::test]
    async fn test_edit_refused_while_locked_by_other() {
        let f = fixture();
        let (s1, _rx1) = session(1);
        let (s2, _rx2) = session(2);
        assert!(f.locks.try_acquire(Datastore::Running, OwnerId::Session(SessionId(1))));

        let err = f
            .edit
            .execute(&request(&s2, "edit-config", hostname_edit("r2")), &s2)
            .await
            .unwrap_err();
        assert_eq!(err.error_tag, ErrorTag::InUse);
        assert_eq!(f.store.get(Datastore::Running, "/system/hostname"), None);

        // The holder edits straight through its own lock.
        f.edit
            .execute(&request(&s1, "edit-config", hostname_edit("r1")), &s1)
            .await
            .unwrap();
        assert_eq!(f.locks.hold_info(&Datastore::Running).map(|h| h.depth), Some(1));
    }

    #[tokio::test]
    async fn test_same_session_creates_do_not_overlap() {
        let f = fixture();
        f.coordinator.register(Arc::new(Slow));
        let (s1, _rx) = session(1);
        assert!(f.locks.try_acquire(Datastore::Running, OwnerId::Session(SessionId(1))));

        let create = json!({
            "target": "running",
            "changes": [ { "path": "/a", "operation": "create", "value": 1 } ]
        });
        let first = request(&s1, "edit-config", create.clone());
        let second = request(&s1, "edit-config", create);
        let (first, second) = tokio::join!(
            f.edit.execute(&first, &s1),
            f.edit.execute(&second, &s1)
        );

        let committed = [first.is_ok(), second.is_ok()].into_iter().filter(|ok| *ok).count();
        assert_eq!(committed, 1);
        assert_eq!(f.store.get(Datastore::Running, "/a"), Some(json!(1)));
        assert!(f.commit_locks.is_empty());
        assert_eq!(f.locks.holder(&Datastore::Running), Some(OwnerId::Session(SessionId(1))));
    }

    #[tokio::test]
    async fn test_release_during_edit_keeps_commit_section() {
        let f = fixture();
        f.coordinator.register(Arc::new(Slow));
        let (s1, _rx) = session(1);
        let owner = OwnerId::Session(SessionId(1));
        assert!(f.locks.try_acquire(Datastore::Running, owner));

        let edit = request(&s1, "edit-config", hostname_edit("r1"));
        let teardown = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(matches!(
                f.commit_locks.holder(&Datastore::Running),
                Some(OwnerId::Task(_))
            ));
            f.locks.release_all(owner)
        };
        let (result, released) = tokio::join!(f.edit.execute(&edit, &s1), teardown);

        result.unwrap();
        assert_eq!(released, 1);
        assert!(f.commit_locks.is_empty());
        assert!(f.locks.is_empty());
        assert_eq!(f.store.get(Datastore::Running, "/system/hostname"), Some(json!("r1")));
    }

    #[tokio::test]
    async fn test_edit_pre_commit_rejection() {
        let f = fixture();
        f.coordinator.register(Arc::new(Rejecting));
        let (s1, _rx) = session(1);

        let err = f
            .edit
            .execute(&request(&s1, "edit-config", hostname_edit("r1")), &s1)
            .await
            .unwrap_err();
        assert_eq!(err.error_tag, ErrorTag::InvalidValue);
        assert_eq!(f.store.get(Datastore::Running, "/system/hostname"), None);
    }

    #[tokio::test]
    async fn test_edit_validation() {
        let f = fixture();
        let (base, _rx) = base_only_session(4);
        let err = f
            .edit
            .validate(&request(&base, "edit-config", hostname_edit("x")), &base)
            .unwrap_err();
        assert_eq!(err.error_tag, ErrorTag::OperationNotSupported);

        let (s1, _rx1) = session(1);
        let startup = json!({ "target": "startup", "changes": [] });
        let err = f
            .edit
            .validate(&request(&s1, "edit-config", startup), &s1)
            .unwrap_err();
        assert_eq!(err.error_tag, ErrorTag::InvalidValue);

        let err = f
            .edit
            .validate(&request(&s1, "edit-config", json!({ "target": "running" })), &s1)
            .unwrap_err();
        assert_eq!(err.error_tag, ErrorTag::MissingElement);
    }

    #[tokio::test]
    async fn test_get_config() {
        let f = fixture();
        let (s1, _rx) = session(1);
        f.edit
            .execute(&request(&s1, "edit-config", hostname_edit("r1")), &s1)
            .await
            .unwrap();

        let output = f
            .get
            .execute(&request(&s1, "get-config", json!({ "target": "running" })), &s1)
            .await
            .unwrap();
        assert_eq!(
            output.reply,
            ReplyBody::Data(json!({ "/system/hostname": "r1" }))
        );
    }
}
