//! # Engine Scenarios
//!
//! The four canonical behaviours of the engine core, exercised through the
//! public crate APIs:
//!
//! 1. Keyed lock hand-back between two tasks
//! 2. Fail-fast pre-commit across three subsystems
//! 3. `create-subscription` through a dispatcher without a channel
//! 4. Suppressed `yang-library-change` when no module matches

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use nc_01_keyed_lock::{KeyedLockManager, OwnerId};
    use nc_03_session::test_utils::detached_session;
    use nc_04_rpc_router::{RequestState, ASYNC_DISPATCH_REQUIRED};
    use nc_05_subsystem_coordinator::{
        CompositeSubsystem, CoordinatorConfig, Subsystem, SubsystemError,
    };
    use nc_06_notifications::{InMemoryModuleCatalog, YangLibraryChangeNotifier};
    use netconf_server::{ServerConfig, ServerContainer};
    use parking_lot::Mutex;
    use serde_json::json;
    use shared_types::{
        Capability, CapabilitySet, ChangeOperation, ChangeSet, Datastore, Notification,
        NotificationSink, OperationName, RpcRequest, SessionId,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // =========================================================================
    // SCENARIO 1: KEYED LOCK
    // =========================================================================

    #[tokio::test]
    async fn test_scenario_1_try_acquire_after_release() {
        let locks: KeyedLockManager<String> = KeyedLockManager::reentrant();
        let t1 = OwnerId::Task(1);
        let t2 = OwnerId::Task(2);

        locks.acquire("session-42".to_string(), t1).await.unwrap();
        assert!(!locks.try_acquire("session-42".to_string(), t2));

        locks.release(&"session-42".to_string(), t1).unwrap();
        assert!(locks.try_acquire("session-42".to_string(), t2));
        assert_eq!(locks.holder(&"session-42".to_string()), Some(t2));
    }

    // =========================================================================
    // SCENARIO 2: FAIL-FAST PRE-COMMIT
    // =========================================================================

    struct Counting {
        name: &'static str,
        pre_commits: AtomicUsize,
        reject: bool,
    }

    impl Counting {
        fn new(name: &'static str, reject: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                pre_commits: AtomicUsize::new(0),
                reject,
            })
        }
    }

    #[async_trait]
    impl Subsystem for Counting {
        fn name(&self) -> &str {
            self.name
        }

        async fn pre_commit(&self, _change_set: &ChangeSet) -> Result<(), SubsystemError> {
            self.pre_commits.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(SubsystemError::validation(self.name, "mtu out of range")
                    .at("/interfaces/interface[name='eth0']/mtu"));
            }
            Ok(())
        }

        async fn commit(&self, _change_set: &ChangeSet) -> Result<(), SubsystemError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_scenario_2_pre_commit_stops_at_first_failure() {
        let coordinator = CompositeSubsystem::new(CoordinatorConfig::default());
        let s1 = Counting::new("s1", false);
        let s2 = Counting::new("s2", true);
        let s3 = Counting::new("s3", false);
        coordinator.register(s1.clone());
        coordinator.register(s2.clone());
        coordinator.register(s3.clone());

        let change_set = ChangeSet::builder(Datastore::Running)
            .change(
                "/interfaces/interface[name='eth0']/mtu",
                ChangeOperation::Replace,
                Some(json!(100_000)),
            )
            .build();

        let err = coordinator.pre_commit(&change_set).await.unwrap_err();

        assert_eq!(s1.pre_commits.load(Ordering::SeqCst), 1);
        assert_eq!(s2.pre_commits.load(Ordering::SeqCst), 1);
        assert_eq!(s3.pre_commits.load(Ordering::SeqCst), 0);
        assert_eq!(
            err,
            SubsystemError::validation("s2", "mtu out of range")
                .at("/interfaces/interface[name='eth0']/mtu")
        );
    }

    // =========================================================================
    // SCENARIO 3: STREAMING OPERATION WITHOUT A CHANNEL
    // =========================================================================

    #[tokio::test]
    async fn test_scenario_3_create_subscription_needs_async_dispatcher() {
        let container = ServerContainer::new(ServerConfig::default()).unwrap();
        let (session, mut outbound) = detached_session(
            SessionId(7),
            "admin",
            CapabilitySet::new([Capability::BASE_1_1, Capability::NOTIFICATION_1_0]),
            8,
        );
        let request = RpcRequest {
            message_id: "12".into(),
            operation: OperationName::create_subscription(),
            payload: json!({}),
            session_id: session.id(),
            sequence: session.next_sequence(),
        };

        let completion = container.router.dispatch(&request, &session).await;

        assert_eq!(completion.state, RequestState::Failed);
        let error = completion.error().unwrap();
        assert_eq!(error.message, ASYNC_DISPATCH_REQUIRED);
        assert_eq!(
            error.message,
            "operation requires an async-capable dispatcher"
        );
        assert_eq!(container.notifications.subscription_count(), 0);
        assert!(outbound.try_recv().is_err());
        container.shutdown().await;
    }

    // =========================================================================
    // SCENARIO 4: SUPPRESSED YANG-LIBRARY-CHANGE
    // =========================================================================

    #[derive(Default)]
    struct CountingSink {
        calls: AtomicUsize,
        seen: Mutex<Vec<Notification>>,
    }

    impl NotificationSink for CountingSink {
        fn publish(&self, notification: Notification) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(notification);
        }
    }

    #[tokio::test]
    async fn test_scenario_4_no_module_no_notification() {
        let catalog = Arc::new(InMemoryModuleCatalog::new(vec![]));
        let sink = Arc::new(CountingSink::default());
        let notifier = YangLibraryChangeNotifier::new(catalog, sink.clone());

        let published = notifier.module_set_changed("aabbccdd").await.unwrap();

        assert!(!published);
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
        assert!(sink.seen.lock().is_empty());
    }
}
