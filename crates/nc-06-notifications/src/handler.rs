//! `create-subscription` operation.

use crate::domain::StreamFilter;
use crate::pipeline::NotificationPipeline;
use async_trait::async_trait;
use nc_03_session::{Session, SessionChannel};
use nc_04_rpc_router::StreamingRpcHandler;
use shared_types::{Capability, RpcError, RpcRequest, DEFAULT_STREAM};
use std::sync::Arc;

pub struct CreateSubscriptionHandler {
    pipeline: Arc<NotificationPipeline>,
}

impl CreateSubscriptionHandler {
    pub fn new(pipeline: Arc<NotificationPipeline>) -> Self {
        Self { pipeline }
    }

    fn filter(request: &RpcRequest) -> Result<StreamFilter, RpcError> {
        let stream = request
            .optional::<String>("stream")?
            .unwrap_or_else(|| DEFAULT_STREAM.to_string());
        let event_types = request
            .optional::<Vec<String>>("event-types")?
            .unwrap_or_default();
        Ok(StreamFilter::stream(stream).with_event_types(event_types))
    }
}

#[async_trait]
impl StreamingRpcHandler for CreateSubscriptionHandler {
    fn required_capabilities(&self) -> &[&'static str] {
        &[Capability::NOTIFICATION_1_0]
    }

    fn validate(&self, request: &RpcRequest, _session: &Session) -> Result<(), RpcError> {
        if request.input("start-time").is_some() {
            return Err(RpcError::invalid_value("replay is not supported").with_path("start-time"));
        }
        let filter = Self::filter(request)?;
        if !self.pipeline.config().streams.contains(&filter.stream) {
            return Err(RpcError::invalid_value(format!("unknown stream: {}", filter.stream))
                .with_path("stream"));
        }
        Ok(())
    }

    async fn execute(
        &self,
        request: &RpcRequest,
        session: &Arc<Session>,
        channel: &SessionChannel,
    ) -> Result<(), RpcError> {
        let filter = Self::filter(request)?;
        self.pipeline
            .create_subscription(session, filter, channel, &request.message_id)
            .await
            .map(|_| ())
            .map_err(|e| e.to_rpc_error())
    }
}
