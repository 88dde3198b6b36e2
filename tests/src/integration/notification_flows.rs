//! # Notification Flows
//!
//! Subscriptions created over a live session receive the side-channel
//! notifications other sessions' handlers emit.

#[cfg(test)]
mod tests {
    use crate::fixtures::{TestServer, WAIT};
    use netconf_server::handlers::CONFIG_CHANGE_EVENT;
    use nc_06_notifications::YANG_LIBRARY_CHANGE;
    use serde_json::json;
    use shared_types::{Capability, CapabilitySet, ErrorTag, OperationName, ReplyBody};
    use std::time::Duration;

    fn edit(path: &str) -> serde_json::Value {
        json!({
            "target": "running",
            "changes": [ { "path": path, "operation": "replace", "value": 1 } ]
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_edit_config_notifies_subscribers() {
        let server = TestServer::start();
        let mut watcher = server.connect("auditor").await;
        let mut editor = server.connect("operator").await;

        let ack = watcher
            .call_op(OperationName::create_subscription(), json!({}))
            .await;
        assert_eq!(ack.body, ReplyBody::Ok);

        assert_eq!(editor.call("edit-config", edit("/a")).await.body, ReplyBody::Ok);

        let event = watcher.next_notification(WAIT).await.unwrap();
        assert_eq!(event.event_type, CONFIG_CHANGE_EVENT);
        assert_eq!(event.origin.as_str(), "operator");
        assert_eq!(
            event.body["changed-by"]["session-id"],
            json!(editor.session_id.0)
        );
        assert_eq!(event.body["edit"][0]["target"], json!("/a"));

        // Interleaved RPCs keep working on the subscribed session.
        let config = watcher.call("get-config", json!({ "target": "running" })).await;
        assert_eq!(config.body, ReplyBody::Data(json!({ "/a": 1 })));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_event_type_filter() {
        let server = TestServer::start();
        let mut watcher = server.connect("auditor").await;
        let mut editor = server.connect("operator").await;

        watcher
            .call_op(
                OperationName::create_subscription(),
                json!({ "event-types": [YANG_LIBRARY_CHANGE] }),
            )
            .await;

        editor.call("edit-config", edit("/b")).await;
        assert!(server
            .container()
            .yang_library
            .module_set_changed("cafe01")
            .await
            .unwrap());

        let event = watcher.next_notification(WAIT).await.unwrap();
        assert_eq!(event.event_type, YANG_LIBRARY_CHANGE);
        assert_eq!(event.body["module-set-id"], json!("cafe01"));
        assert!(watcher
            .next_notification(Duration::from_millis(100))
            .await
            .is_none());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_subscription_needs_notification_capability() {
        let server = TestServer::start();
        let mut plain = server
            .connect_with(
                "admin",
                CapabilitySet::new([Capability::BASE_1_1, Capability::WRITABLE_RUNNING_1_0]),
            )
            .await;

        let reply = plain
            .call_op(OperationName::create_subscription(), json!({}))
            .await;
        assert_eq!(
            reply.first_error().unwrap().error_tag,
            ErrorTag::OperationNotSupported
        );
        assert_eq!(server.container().notifications.subscription_count(), 0);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_stream_and_replay_rejected() {
        let server = TestServer::start();
        let mut watcher = server.connect("auditor").await;

        let reply = watcher
            .call_op(OperationName::create_subscription(), json!({ "stream": "SYSLOG" }))
            .await;
        assert_eq!(reply.first_error().unwrap().error_tag, ErrorTag::InvalidValue);

        let reply = watcher
            .call_op(
                OperationName::create_subscription(),
                json!({ "start-time": "2024-01-01T00:00:00Z" }),
            )
            .await;
        assert_eq!(reply.first_error().unwrap().path.as_deref(), Some("start-time"));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_closing_session_drops_its_subscriptions() {
        let server = TestServer::start();
        let mut watcher = server.connect("auditor").await;
        let _other = server.connect("admin").await;
        server.await_sessions(2).await;

        watcher
            .call_op(OperationName::create_subscription(), json!({}))
            .await;
        assert_eq!(server.container().notifications.subscription_count(), 1);

        watcher.call("close-session", json!({})).await;
        server.await_sessions(1).await;
        assert_eq!(server.container().notifications.subscription_count(), 0);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_subscription_limit_per_session() {
        let server = TestServer::start_with(|config| {
            config.notifications.max_subscriptions_per_session = 1;
        });
        let mut watcher = server.connect("auditor").await;

        let first = watcher
            .call_op(OperationName::create_subscription(), json!({}))
            .await;
        assert_eq!(first.body, ReplyBody::Ok);

        let second = watcher
            .call_op(OperationName::create_subscription(), json!({}))
            .await;
        assert_eq!(
            second.first_error().unwrap().error_tag,
            ErrorTag::ResourceDenied
        );
        server.stop().await;
    }
}
