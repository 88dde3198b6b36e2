//! # Notification Pipeline
//!
//! ```text
//! producer ──publish()──→ [bounded queue] ──→ dispatcher task ──try_notify──→ session channels
//!    (never waits)              │                                  │
//!                          full: dropped                 closed: subscription removed
//!                                                        full:   that delivery dropped
//! ```
//!
//! The dispatcher never awaits a subscriber, so one slow session cannot hold
//! up the others.

use crate::config::NotificationConfig;
use crate::domain::{StreamFilter, Subscription, SubscriptionError, SubscriptionId};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use nc_03_session::{ChannelError, CloseReason, Session, SessionChannel, SessionLifecycleListener};
use shared_types::{Notification, NotificationSink, RpcReply, SessionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delivery counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// `publish` calls.
    pub published: AtomicU64,
    /// Notifications written to a subscriber's channel.
    pub delivered: AtomicU64,
    /// Deliveries skipped because the subscriber's channel was full.
    pub dropped: AtomicU64,
    /// Notifications refused because the dispatch queue was full.
    pub queue_full: AtomicU64,
    /// Subscriptions removed because their channel was closed.
    pub evicted: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub queue_full: u64,
    pub evicted: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

struct Registry {
    subscriptions: DashMap<SubscriptionId, Subscription>,
    by_session: DashMap<SessionId, Vec<SubscriptionId>>,
    stats: PipelineStats,
}

impl Registry {
    fn remove(&self, id: SubscriptionId) -> Option<Subscription> {
        let (_, subscription) = self.subscriptions.remove(&id)?;
        if let Some(mut ids) = self.by_session.get_mut(&subscription.session_id) {
            ids.retain(|s| *s != id);
        }
        self.by_session
            .remove_if(&subscription.session_id, |_, ids| ids.is_empty());
        Some(subscription)
    }

    /// Give back a slot whose subscription was never registered.
    fn release(&self, session_id: SessionId, id: SubscriptionId) {
        if let Some(mut ids) = self.by_session.get_mut(&session_id) {
            ids.retain(|s| *s != id);
        }
        self.by_session.remove_if(&session_id, |_, ids| ids.is_empty());
    }

    fn deliver(&self, notification: &Notification) {
        let mut closed = Vec::new();
        for entry in self.subscriptions.iter() {
            let subscription = entry.value();
            if !subscription.filter.matches(notification) {
                continue;
            }
            match subscription.channel.try_notify(notification.clone()) {
                Ok(()) => {
                    self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(ChannelError::Full) => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        subscription = %subscription.id,
                        session_id = %subscription.session_id,
                        event_type = %notification.event_type,
                        "[Notifications] subscriber queue full, notification dropped"
                    );
                }
                Err(ChannelError::Closed) => closed.push(subscription.id),
            }
        }

        for id in closed {
            if let Some(subscription) = self.remove(id) {
                self.stats.evicted.fetch_add(1, Ordering::Relaxed);
                debug!(
                    subscription = %id,
                    session_id = %subscription.session_id,
                    "[Notifications] subscriber channel closed, subscription removed"
                );
            }
        }
    }
}

/// Subscription table plus the dispatch queue in front of it.
pub struct NotificationPipeline {
    registry: Arc<Registry>,
    queue: mpsc::Sender<Notification>,
    next_id: AtomicU64,
    config: NotificationConfig,
}

impl NotificationPipeline {
    /// Create the pipeline and spawn its dispatcher on the current runtime.
    ///
    /// The dispatcher exits once the pipeline is dropped and its queue drained.
    pub fn spawn(config: NotificationConfig) -> (Arc<Self>, JoinHandle<()>) {
        let (queue, mut inbox) = mpsc::channel::<Notification>(config.queue_capacity.max(1));
        let registry = Arc::new(Registry {
            subscriptions: DashMap::new(),
            by_session: DashMap::new(),
            stats: PipelineStats::default(),
        });

        let dispatcher = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                while let Some(notification) = inbox.recv().await {
                    registry.deliver(&notification);
                }
                debug!("[Notifications] dispatcher stopped");
            })
        };

        let pipeline = Arc::new(Self {
            registry,
            queue,
            next_id: AtomicU64::new(1),
            config,
        });
        (pipeline, dispatcher)
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.registry.stats.snapshot()
    }

    /// Register a subscription for `session` after acknowledging `message_id`
    /// on `channel`.
    ///
    /// The acknowledgement is queued before the subscription becomes visible
    /// to the dispatcher, so it always precedes the first notification.
    pub async fn create_subscription(
        &self,
        session: &Session,
        filter: StreamFilter,
        channel: &SessionChannel,
        message_id: &str,
    ) -> Result<SubscriptionId, SubscriptionError> {
        if !self.config.streams.iter().any(|s| *s == filter.stream) {
            return Err(SubscriptionError::UnknownStream(filter.stream));
        }
        let id = self.reserve(session.id())?;

        if channel.send_reply(RpcReply::ok(message_id)).await.is_err() {
            self.registry.release(session.id(), id);
            return Err(SubscriptionError::ChannelClosed);
        }

        let subscription = Subscription {
            id,
            session_id: session.id(),
            filter,
            created_at: Utc::now(),
            channel: channel.clone(),
        };
        self.registry.subscriptions.insert(id, subscription);

        // A session torn down while the ack was queued never sees its
        // listener run again.
        if channel.is_closed() {
            self.registry.remove(id);
            return Err(SubscriptionError::ChannelClosed);
        }

        info!(
            session_id = %session.id(),
            subscription = %id,
            "[Notifications] subscription created"
        );
        Ok(id)
    }

    /// Claim one of the session's subscription slots. The count and the
    /// claim happen under the session's entry.
    fn reserve(&self, session_id: SessionId) -> Result<SubscriptionId, SubscriptionError> {
        let limit = self.config.max_subscriptions_per_session;
        let reserved = {
            let mut ids = self.registry.by_session.entry(session_id).or_default();
            if ids.len() >= limit {
                None
            } else {
                let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
                ids.push(id);
                Some(id)
            }
        };
        reserved.ok_or_else(|| {
            self.registry
                .by_session
                .remove_if(&session_id, |_, ids| ids.is_empty());
            SubscriptionError::LimitExceeded { limit }
        })
    }

    /// Queue a notification for delivery. Never waits.
    pub fn publish(&self, notification: Notification) {
        self.registry.stats.published.fetch_add(1, Ordering::Relaxed);
        match self.queue.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(notification)) => {
                self.registry.stats.queue_full.fetch_add(1, Ordering::Relaxed);
                warn!(
                    event_type = %notification.event_type,
                    "[Notifications] dispatch queue full, notification dropped"
                );
            }
            Err(TrySendError::Closed(notification)) => {
                warn!(
                    event_type = %notification.event_type,
                    "[Notifications] dispatcher stopped, notification dropped"
                );
            }
        }
    }

    pub fn cancel(&self, id: SubscriptionId) -> bool {
        self.registry.remove(id).is_some()
    }

    /// Drop every subscription the session holds.
    pub fn remove_session(&self, session_id: SessionId) -> usize {
        let Some((_, ids)) = self.registry.by_session.remove(&session_id) else {
            return 0;
        };
        let removed = ids
            .iter()
            .filter(|id| self.registry.subscriptions.remove(*id).is_some())
            .count();
        if removed > 0 {
            debug!(session_id = %session_id, removed, "[Notifications] session subscriptions removed");
        }
        removed
    }

    pub fn session_subscriptions(&self, session_id: SessionId) -> Vec<SubscriptionId> {
        self.registry
            .by_session
            .get(&session_id)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    pub fn subscription(&self, id: SubscriptionId) -> Option<Subscription> {
        self.registry.subscriptions.get(&id).map(|s| s.clone())
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.subscriptions.len()
    }
}

impl NotificationSink for NotificationPipeline {
    fn publish(&self, notification: Notification) {
        NotificationPipeline::publish(self, notification);
    }
}

#[async_trait]
impl SessionLifecycleListener for NotificationPipeline {
    async fn session_closed(&self, session: &Session, _reason: CloseReason) {
        self.remove_session(session.id());
    }
}
