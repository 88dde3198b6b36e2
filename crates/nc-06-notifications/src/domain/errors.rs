use shared_types::RpcError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("unknown stream: {0}")]
    UnknownStream(String),

    #[error("session already holds {limit} subscriptions")]
    LimitExceeded { limit: usize },

    #[error("replay is not supported")]
    ReplayNotSupported,

    #[error("session channel is closed")]
    ChannelClosed,
}

impl SubscriptionError {
    pub fn to_rpc_error(&self) -> RpcError {
        match self {
            Self::UnknownStream(_) | Self::ReplayNotSupported => {
                RpcError::invalid_value(self.to_string())
            }
            Self::LimitExceeded { .. } => RpcError::resource_denied(self.to_string()),
            Self::ChannelClosed => RpcError::operation_failed(self.to_string()),
        }
    }
}
