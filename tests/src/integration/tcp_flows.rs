//! # TCP Flows
//!
//! The full stack over a real socket with end-of-message framing.

#[cfg(test)]
mod tests {
    use crate::fixtures::{TestServer, PASSWORD, WAIT};
    use nc_03_session::FrameReader;
    use netconf_server::transport::{DelimitedReader, FRAME_DELIMITER};
    use netconf_server::{NetconfServer, ServerConfig, ServerContainer, TcpTransportListener};
    use serde_json::json;
    use shared_types::{
        Capability, CapabilitySet, Credentials, ErrorTag, OperationName, ReplyBody, RpcReply,
        WireMessage,
    };
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::TcpStream;

    struct TcpClient {
        reader: DelimitedReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl TcpClient {
        async fn connect(address: std::net::SocketAddr) -> Self {
            let stream = TcpStream::connect(address).await.unwrap();
            let (read, write) = stream.into_split();
            Self {
                reader: DelimitedReader::new(read, 1 << 20),
                writer: write,
            }
        }

        async fn send(&mut self, message: WireMessage) {
            let mut frame = serde_json::to_vec(&message).unwrap();
            frame.extend_from_slice(FRAME_DELIMITER);
            self.send_raw(&frame).await;
        }

        async fn send_raw(&mut self, bytes: &[u8]) {
            self.writer.write_all(bytes).await.unwrap();
        }

        async fn recv(&mut self) -> Option<WireMessage> {
            tokio::time::timeout(WAIT, self.reader.read_frame())
                .await
                .unwrap()
                .unwrap()
        }

        async fn reply(&mut self) -> RpcReply {
            loop {
                match self.recv().await {
                    Some(WireMessage::RpcReply(reply)) => return reply,
                    Some(_) => continue,
                    None => panic!("connection closed while waiting for a reply"),
                }
            }
        }

        async fn login(&mut self) {
            self.send(WireMessage::Auth(Credentials::Password {
                username: "admin".into(),
                password: PASSWORD.into(),
            }))
            .await;
            assert!(matches!(
                self.recv().await,
                Some(WireMessage::Hello { session_id: Some(_), .. })
            ));
            self.send(WireMessage::Hello {
                capabilities: CapabilitySet::new([
                    Capability::BASE_1_0,
                    Capability::WRITABLE_RUNNING_1_0,
                ]),
                session_id: None,
            })
            .await;
        }

        async fn rpc(&mut self, id: &str, op: &str, payload: serde_json::Value) -> RpcReply {
            self.send(WireMessage::Rpc {
                message_id: id.into(),
                operation: OperationName::base(op),
                payload,
            })
            .await;
            self.reply().await
        }
    }

    async fn tcp_server(max_frame_bytes: usize) -> (Arc<NetconfServer>, std::net::SocketAddr) {
        let mut config = ServerConfig::default();
        config.auth.users = TestServer::users();
        config.listener.max_frame_bytes = max_frame_bytes;
        let listener = TcpTransportListener::bind("127.0.0.1:0", max_frame_bytes)
            .await
            .unwrap();
        let address = listener.local_addr().unwrap();
        let server = Arc::new(NetconfServer::new(Arc::new(ServerContainer::new(config).unwrap())));
        {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run(listener).await });
        }
        (server, address)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_edit_and_read_over_tcp() {
        let (server, address) = tcp_server(64 * 1024).await;
        let mut client = TcpClient::connect(address).await;
        client.login().await;

        let edit = json!({
            "target": "running",
            "changes": [ { "path": "/system/hostname", "operation": "replace", "value": "edge-1" } ]
        });
        assert_eq!(client.rpc("1", "edit-config", edit).await.body, ReplyBody::Ok);
        let config = client.rpc("2", "get-config", json!({ "target": "running" })).await;
        assert_eq!(config.body, ReplyBody::Data(json!({ "/system/hostname": "edge-1" })));

        assert_eq!(client.rpc("3", "close-session", json!({})).await.body, ReplyBody::Ok);
        assert_eq!(client.recv().await, None);

        server.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_oversized_frame_keeps_session() {
        let (server, address) = tcp_server(2048).await;
        let mut client = TcpClient::connect(address).await;
        client.login().await;

        let mut oversized = vec![b' '; 4096];
        oversized.extend_from_slice(b"{}");
        oversized.extend_from_slice(FRAME_DELIMITER);
        client.send_raw(&oversized).await;

        let reply = client.reply().await;
        assert_eq!(reply.message_id, "");
        assert_eq!(reply.first_error().unwrap().error_tag, ErrorTag::MalformedMessage);

        let config = client.rpc("9", "get-config", json!({ "target": "running" })).await;
        assert_eq!(config.body, ReplyBody::Data(json!({})));
        server.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_garbage_frame_is_malformed_message() {
        let (server, address) = tcp_server(64 * 1024).await;
        let mut client = TcpClient::connect(address).await;
        client.login().await;

        let mut garbage = b"<rpc message-id=\"1\"><get/></rpc>".to_vec();
        garbage.extend_from_slice(FRAME_DELIMITER);
        client.send_raw(&garbage).await;

        let reply = client.reply().await;
        assert_eq!(reply.first_error().unwrap().error_tag, ErrorTag::MalformedMessage);
        assert_eq!(client.rpc("2", "close-session", json!({})).await.body, ReplyBody::Ok);
        server.shutdown();
    }
}
