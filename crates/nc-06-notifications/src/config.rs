use serde::{Deserialize, Serialize};
use shared_types::DEFAULT_STREAM;

/// Notification pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Notifications waiting for the dispatcher before `publish` starts
    /// dropping them.
    pub queue_capacity: usize,
    pub max_subscriptions_per_session: usize,
    /// Streams sessions may subscribe to.
    pub streams: Vec<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_subscriptions_per_session: 8,
            streams: vec![DEFAULT_STREAM.to_string()],
        }
    }
}
