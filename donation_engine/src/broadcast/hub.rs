use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::*;
use tokio::{task::JoinHandle, time::Instant};

use crate::broadcast::{BroadcastError, PayNotification, SubscriberSink};

pub const DEFAULT_SEND_ATTEMPTS: usize = 2;

/// 16 hex characters
pub type ConnId = String;

fn new_conn_id() -> ConnId {
    hex::encode(rand::random::<[u8; 8]>())
}

/// What a subscriber wants to hear about. An empty axis matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriberFilter {
    pub tenant_id: String,
    pub category_id: String,
}

impl SubscriberFilter {
    pub fn new(tenant_id: Option<&str>, category_id: Option<&str>) -> Self {
        let clean = |s: Option<&str>| s.map(|v| v.trim().to_string()).unwrap_or_default();
        Self { tenant_id: clean(tenant_id), category_id: clean(category_id) }
    }

    /// True when each axis is empty on either side or equal on both.
    pub fn matches(&self, tenant_id: &str, category_id: &str) -> bool {
        let axis = |mine: &str, theirs: &str| mine.is_empty() || theirs.is_empty() || mine == theirs;
        axis(&self.tenant_id, tenant_id) && axis(&self.category_id, category_id)
    }
}

struct Subscriber {
    sink: Arc<dyn SubscriberSink>,
    filter: SubscriberFilter,
    remote_ip: Option<String>,
    connected_at: DateTime<Utc>,
    last_seen: Instant,
}

/// A snapshot of one connection, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberInfo {
    pub id: ConnId,
    pub filter: SubscriberFilter,
    pub remote_ip: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// The set of live subscriber connections.
#[derive(Clone)]
pub struct BroadcastHub {
    subscribers: Arc<DashMap<ConnId, Subscriber>>,
    send_attempts: usize,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_ATTEMPTS)
    }
}

impl BroadcastHub {
    pub fn new(send_attempts: usize) -> Self {
        Self { subscribers: Arc::new(DashMap::new()), send_attempts: send_attempts.max(1) }
    }

    pub fn register(&self, sink: Arc<dyn SubscriberSink>, filter: SubscriberFilter, remote_ip: Option<String>) -> ConnId {
        let id = new_conn_id();
        info!(
            "📣️ Subscriber {id} connected from {} (payment: '{}', category: '{}')",
            remote_ip.as_deref().unwrap_or("unknown"),
            filter.tenant_id,
            filter.category_id
        );
        let subscriber = Subscriber { sink, filter, remote_ip, connected_at: Utc::now(), last_seen: Instant::now() };
        self.subscribers.insert(id.clone(), subscriber);
        id
    }

    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.subscribers.remove(id).is_some();
        if removed {
            info!("📣️ Subscriber {id} disconnected. {} remain.", self.subscribers.len());
        }
        removed
    }

    /// Records a sign of life from the subscriber.
    pub fn touch(&self, id: &str) -> bool {
        match self.subscribers.get_mut(id) {
            Some(mut subscriber) => {
                subscriber.last_seen = Instant::now();
                true
            },
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        self.subscribers
            .iter()
            .map(|entry| SubscriberInfo {
                id: entry.key().clone(),
                filter: entry.filter.clone(),
                remote_ip: entry.remote_ip.clone(),
                connected_at: entry.connected_at,
            })
            .collect()
    }

    /// Removes and closes every subscriber that has been silent for longer than `timeout`.
    pub fn prune_stale(&self, timeout: Duration) -> Vec<ConnId> {
        let stale = self
            .subscribers
            .iter()
            .filter(|entry| entry.last_seen.elapsed() > timeout)
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        for id in &stale {
            if let Some((_, subscriber)) = self.subscribers.remove(id) {
                warn!("📣️ Subscriber {id} missed its heartbeat. Closing the connection.");
                tokio::spawn(async move { subscriber.sink.close().await });
            }
        }
        stale
    }

    /// Sends `notification` to every subscriber.
    pub fn broadcast(&self, notification: &PayNotification) -> Result<Vec<JoinHandle<bool>>, BroadcastError> {
        self.send_where(notification, |_| true)
    }

    /// Sends `notification` to the subscribers whose filter matches the given tenant and category.
    pub fn broadcast_to_filtered(
        &self,
        notification: &PayNotification,
        tenant_id: &str,
        category_id: &str,
    ) -> Result<Vec<JoinHandle<bool>>, BroadcastError> {
        self.send_where(notification, |filter| filter.matches(tenant_id, category_id))
    }

    /// Each send runs on its own task. A subscriber that fails every attempt is closed and dropped. The returned
    /// handles resolve to whether the frame was delivered; callers are free to ignore them.
    fn send_where<F>(&self, notification: &PayNotification, predicate: F) -> Result<Vec<JoinHandle<bool>>, BroadcastError>
    where F: Fn(&SubscriberFilter) -> bool {
        let text = serde_json::to_string(notification).map_err(|e| BroadcastError::Serialization(e.to_string()))?;
        let targets = self
            .subscribers
            .iter()
            .filter(|entry| predicate(&entry.filter))
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.sink)))
            .collect::<Vec<_>>();
        debug!("📣️ Sending order {} to {} of {} subscribers", notification.order_no, targets.len(), self.len());
        let handles = targets
            .into_iter()
            .map(|(id, sink)| {
                let text = text.clone();
                let subscribers = Arc::clone(&self.subscribers);
                let attempts = self.send_attempts;
                tokio::spawn(async move {
                    for attempt in 1..=attempts {
                        match sink.send_text(text.clone()).await {
                            Ok(()) => return true,
                            Err(e) => warn!("📣️ Send to subscriber {id} failed (attempt {attempt}/{attempts}). {e}"),
                        }
                    }
                    error!("📣️ Giving up on subscriber {id}. Closing the connection.");
                    subscribers.remove(&id);
                    sink.close().await;
                    false
                })
            })
            .collect();
        Ok(handles)
    }
}
