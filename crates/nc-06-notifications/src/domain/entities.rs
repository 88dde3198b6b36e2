use chrono::{DateTime, Utc};
use nc_03_session::SessionChannel;
use serde::{Deserialize, Serialize};
use shared_types::{Notification, SessionId, DEFAULT_STREAM};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Which notifications a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StreamFilter {
    pub stream: String,
    /// Event types to include. Empty means all.
    pub event_types: Vec<String>,
}

impl Default for StreamFilter {
    fn default() -> Self {
        Self {
            stream: DEFAULT_STREAM.to_string(),
            event_types: Vec::new(),
        }
    }
}

impl StreamFilter {
    pub fn stream(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            event_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_event_types<I, S>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.event_types = event_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn matches(&self, notification: &Notification) -> bool {
        self.stream == notification.stream
            && (self.event_types.is_empty()
                || self.event_types.iter().any(|t| *t == notification.event_type))
    }
}

/// A session's standing interest in a stream.
///
/// Delivery goes to the session's own outbound channel.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub session_id: SessionId,
    pub filter: StreamFilter,
    pub created_at: DateTime<Utc>,
    pub(crate) channel: SessionChannel,
}

/// A module known to the schema catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub revision: String,
    pub namespace: String,
}

impl ModuleInfo {
    pub fn new(
        name: impl Into<String>,
        revision: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            revision: revision.into(),
            namespace: namespace.into(),
        }
    }
}
