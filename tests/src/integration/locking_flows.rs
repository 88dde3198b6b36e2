//! # Locking Flows
//!
//! `<lock>`, `edit-config` and `<unlock>` across concurrent sessions, with
//! the datastore lock living in the shared keyed lock manager.

#[cfg(test)]
mod tests {
    use crate::fixtures::TestServer;
    use nc_01_keyed_lock::OwnerId;
    use serde_json::{json, Value};
    use shared_types::{Datastore, ErrorTag, ReplyBody};

    fn hostname(value: &str) -> Value {
        json!({
            "target": "running",
            "changes": [
                { "path": "/system/hostname", "operation": "replace", "value": value }
            ]
        })
    }

    fn running() -> Value {
        json!({ "target": "running" })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lock_blocks_other_sessions_until_unlock() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;
        let mut operator = server.connect("operator").await;

        assert_eq!(admin.call("lock", running()).await.body, ReplyBody::Ok);

        let refused = operator.call("edit-config", hostname("op")).await;
        let error = refused.first_error().unwrap();
        assert_eq!(error.error_tag, ErrorTag::InUse);
        assert_eq!(
            error.info,
            Some(json!({ "session-id": admin.session_id.to_string() }))
        );

        let denied = operator.call("lock", running()).await;
        assert_eq!(denied.first_error().unwrap().error_tag, ErrorTag::LockDenied);

        assert_eq!(admin.call("edit-config", hostname("admin")).await.body, ReplyBody::Ok);
        assert_eq!(admin.call("unlock", running()).await.body, ReplyBody::Ok);

        assert_eq!(operator.call("edit-config", hostname("op")).await.body, ReplyBody::Ok);
        let config = operator.call("get-config", running()).await;
        assert_eq!(config.body, ReplyBody::Data(json!({ "/system/hostname": "op" })));

        assert!(server.container().locks.is_empty());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_unlock_by_non_holder_fails() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;
        let mut operator = server.connect("operator").await;

        admin.call("lock", json!({ "target": "candidate" })).await;
        let reply = operator.call("unlock", json!({ "target": "candidate" })).await;
        assert_eq!(reply.first_error().unwrap().error_tag, ErrorTag::OperationFailed);
        assert_eq!(
            server.container().locks.holder(&Datastore::Candidate),
            Some(OwnerId::Session(admin.session_id))
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_close_session_releases_lock() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;
        let mut operator = server.connect("operator").await;
        server.await_sessions(2).await;

        admin.call("lock", running()).await;
        assert_eq!(admin.call("close-session", json!({})).await.body, ReplyBody::Ok);
        assert!(admin.is_disconnected().await);
        server.await_sessions(1).await;

        assert_eq!(operator.call("lock", running()).await.body, ReplyBody::Ok);
        assert_eq!(
            server.container().locks.holder(&Datastore::Running),
            Some(OwnerId::Session(operator.session_id))
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_dropped_connection_releases_lock() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;
        let mut operator = server.connect("operator").await;
        server.await_sessions(2).await;

        admin.call("lock", running()).await;
        admin.client.close();
        server.await_sessions(1).await;

        assert_eq!(operator.call("lock", running()).await.body, ReplyBody::Ok);
        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_edits_serialize() {
        let server = TestServer::start();
        let mut clients = Vec::new();
        for user in ["admin", "operator", "auditor"] {
            clients.push(server.connect(user).await);
        }

        let edits = clients.into_iter().enumerate().map(|(i, mut client)| {
            tokio::spawn(async move {
                let payload = json!({
                    "target": "running",
                    "changes": [
                        { "path": format!("/users/user{i}"), "operation": "create", "value": i }
                    ]
                });
                client.call("edit-config", payload).await
            })
        });
        for reply in futures::future::join_all(edits).await {
            assert_eq!(reply.unwrap().body, ReplyBody::Ok);
        }

        let contents = server.container().config_store.contents(Datastore::Running);
        assert_eq!(contents.as_object().map(|o| o.len()), Some(3));
        let stats = server.container().coordinator.stats().snapshot();
        assert_eq!(stats.committed, 3);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_rejected_edit_leaves_store_untouched() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;

        let create = json!({
            "target": "running",
            "changes": [ { "path": "/ntp/server", "operation": "create", "value": "10.0.0.1" } ]
        });
        assert_eq!(admin.call("edit-config", create.clone()).await.body, ReplyBody::Ok);

        let duplicate = json!({
            "target": "running",
            "changes": [
                { "path": "/ntp/enabled", "operation": "create", "value": true },
                { "path": "/ntp/server", "operation": "create", "value": "10.0.0.2" }
            ]
        });
        let reply = admin.call("edit-config", duplicate).await;
        let error = reply.first_error().unwrap();
        assert_eq!(error.error_tag, ErrorTag::InvalidValue);
        assert_eq!(error.path.as_deref(), Some("/ntp/server"));

        let config = admin.call("get-config", running()).await;
        assert_eq!(config.body, ReplyBody::Data(json!({ "/ntp/server": "10.0.0.1" })));
        server.stop().await;
    }
}
