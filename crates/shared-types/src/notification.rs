//! # Notifications
//!
//! Event notifications pushed to subscribed sessions, and the port producers
//! publish them through.

use crate::entities::Identity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stream every subscription uses unless it names another.
pub const DEFAULT_STREAM: &str = "NETCONF";

/// An immutable event notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// When the event occurred.
    pub event_time: DateTime<Utc>,
    /// Stream the event belongs to.
    pub stream: String,
    /// Event type, e.g. `netconf-config-change`.
    pub event_type: String,
    /// Event content.
    pub body: serde_json::Value,
    /// Identity the event is attributed to.
    pub origin: Identity,
}

impl Notification {
    /// Create a notification on the default stream, timestamped now.
    pub fn new(event_type: impl Into<String>, body: serde_json::Value, origin: Identity) -> Self {
        Self {
            event_time: Utc::now(),
            stream: DEFAULT_STREAM.to_string(),
            event_type: event_type.into(),
            body,
            origin,
        }
    }

    /// Put the notification on a different stream.
    #[must_use]
    pub fn on_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = stream.into();
        self
    }
}

/// Fire-and-forget publication port.
///
/// Implementations must return without waiting for delivery.
pub trait NotificationSink: Send + Sync {
    /// Hand a notification to the delivery pipeline.
    fn publish(&self, notification: Notification);
}
