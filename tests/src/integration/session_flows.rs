//! # Session Flows
//!
//! Handshake, `close-session`, `kill-session` and the guarantees the serve
//! loop gives a live session.

#[cfg(test)]
mod tests {
    use crate::fixtures::{TestServer, PASSWORD, WAIT};
    use nc_03_session::duplex;
    use serde_json::json;
    use shared_types::{
        Capability, CapabilitySet, Datastore, ErrorTag, OperationName, ReplyBody, WireMessage,
    };

    #[tokio::test]
    async fn test_kill_session_disconnects_target_and_releases_locks() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;
        let mut operator = server.connect("operator").await;
        server.await_sessions(2).await;

        operator.call("lock", json!({ "target": "running" })).await;

        let reply = admin
            .call("kill-session", json!({ "session-id": operator.session_id.0 }))
            .await;
        assert_eq!(reply.body, ReplyBody::Ok);
        assert!(operator.is_disconnected().await);
        server.await_sessions(1).await;

        assert!(server.container().locks.holder(&Datastore::Running).is_none());
        assert_eq!(admin.call("lock", json!({ "target": "running" })).await.body, ReplyBody::Ok);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_kill_session_rejects_self_and_unknown() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;

        let own = admin
            .call("kill-session", json!({ "session-id": admin.session_id.0 }))
            .await;
        assert_eq!(own.first_error().unwrap().error_tag, ErrorTag::InvalidValue);

        let unknown = admin.call("kill-session", json!({ "session-id": 4242 })).await;
        assert_eq!(unknown.first_error().unwrap().error_tag, ErrorTag::InvalidValue);

        // The caller survives both failures.
        assert_eq!(server.container().sessions.len(), 1);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_operation_keeps_session() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;

        let reply = admin
            .call_op(OperationName::new("urn:example:vendor", "reboot"), json!({}))
            .await;
        assert_eq!(
            reply.first_error().unwrap().error_tag,
            ErrorTag::OperationNotSupported
        );

        let next = admin.call("get-config", json!({ "target": "running" })).await;
        assert_eq!(next.body, ReplyBody::Data(json!({})));
        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_replies_follow_request_order() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;

        let mut sent = Vec::new();
        for i in 0..20 {
            let payload = json!({
                "target": "running",
                "changes": [ { "path": format!("/seq/{i}"), "operation": "create", "value": i } ]
            });
            sent.push(admin.send_op(OperationName::base("edit-config"), payload).await);
            sent.push(
                admin
                    .send_op(OperationName::base("get-config"), json!({ "target": "running" }))
                    .await,
            );
        }

        for expected in sent {
            let reply = admin.client.next_reply(WAIT).await.unwrap();
            assert_eq!(reply.message_id, expected);
            assert!(!reply.is_error(), "{reply:?}");
        }
        server.stop().await;
    }

    #[tokio::test]
    async fn test_unexpected_frame_gets_malformed_message() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;

        admin
            .client
            .send(WireMessage::Hello {
                capabilities: CapabilitySet::new([Capability::BASE_1_1]),
                session_id: None,
            })
            .await
            .unwrap();
        let reply = admin.client.next_reply(WAIT).await.unwrap();
        assert_eq!(reply.message_id, "");
        assert_eq!(reply.first_error().unwrap().error_tag, ErrorTag::MalformedMessage);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_handshake_without_common_base_fails() {
        let server = TestServer::start();
        let (connection, mut client) = duplex(8);
        let handshake = tokio::spawn(async move {
            client
                .login(
                    "admin",
                    PASSWORD,
                    CapabilitySet::new([Capability::NOTIFICATION_1_0]),
                )
                .await?;
            // The server drops the connection after rejecting the hello.
            Ok::<_, nc_03_session::TransportError>(client.recv_timeout(WAIT).await)
        });

        server.server.serve_connection(connection).await;
        let outcome = handshake.await.unwrap().unwrap();
        assert!(outcome.is_none());
        assert!(server.container().sessions.is_empty());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let server = TestServer::start();
        let (connection, mut client) = duplex(8);
        let handshake = tokio::spawn(async move {
            client
                .login("admin", "not-the-password", CapabilitySet::new([Capability::BASE_1_1]))
                .await
        });

        server.server.serve_connection(connection).await;
        assert!(handshake.await.unwrap().is_err());
        server.stop().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_every_session() {
        let server = TestServer::start();
        let mut admin = server.connect("admin").await;
        let mut operator = server.connect("operator").await;
        server.await_sessions(2).await;

        let container = std::sync::Arc::clone(server.container());
        server.stop().await;

        assert!(container.sessions.is_empty());
        assert!(admin.is_disconnected().await);
        assert!(operator.is_disconnected().await);
    }
}
