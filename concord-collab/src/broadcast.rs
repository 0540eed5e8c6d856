//! Topic-based fan-out of [`CollabEvent`]s.
//!
//! Uses tokio broadcast channels for O(1) send to all subscribers. Each
//! subscriber gets an independent receiver that buffers up to `capacity`
//! events; a subscriber that falls further behind observes `Lagged` and
//! must resync (e.g. replay the document's operation log).
//!
//! A single publisher per topic plus per-receiver FIFO delivery means every
//! subscriber of a document observes its edits in applied-version order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::event::{CollabEvent, Topic};

/// Hub-wide publish counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BroadcastStats {
    pub events_published: u64,
    /// Events published while nobody was subscribed to their topic
    pub events_unobserved: u64,
    pub topics: usize,
}

/// Fan-out channel for a single topic.
pub struct BroadcastGroup {
    sender: broadcast::Sender<Arc<CollabEvent>>,
}

impl BroadcastGroup {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; returns the number of subscribers it reached.
    pub fn publish(&self, event: Arc<CollabEvent>) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// New receiver that sees every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<CollabEvent>> {
        self.sender.subscribe()
    }

    /// Live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Registry of broadcast groups keyed by topic, so events for different
/// rooms and documents stay isolated.
///
/// A group exists only while someone has subscribed to its topic; once
/// every receiver is gone [`BroadcastHub::prune_idle`] drops it.
pub struct BroadcastHub {
    groups: RwLock<HashMap<Topic, Arc<BroadcastGroup>>>,
    default_capacity: usize,
    published: AtomicU64,
    unobserved: AtomicU64,
}

impl BroadcastHub {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            default_capacity,
            published: AtomicU64::new(0),
            unobserved: AtomicU64::new(0),
        }
    }

    /// Subscribe to `topic`, creating its group on first use.
    pub async fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Arc<CollabEvent>> {
        // Fast path: read lock
        {
            let groups = self.groups.read().await;
            if let Some(group) = groups.get(&topic) {
                return group.subscribe();
            }
        }

        let mut groups = self.groups.write().await;
        groups
            .entry(topic)
            .or_insert_with(|| Arc::new(BroadcastGroup::new(self.default_capacity)))
            .subscribe()
    }

    /// Publish `event` on `topic`. Fire-and-forget: an event nobody is
    /// listening to is counted and dropped, and never creates a group.
    pub async fn publish(&self, topic: Topic, event: CollabEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        log::trace!("publish {} on {topic:?}", event.event_type());
        let group = self.groups.read().await.get(&topic).cloned();
        let reached = match group {
            Some(group) => group.publish(Arc::new(event)),
            None => 0,
        };
        if reached == 0 {
            self.unobserved.fetch_add(1, Ordering::Relaxed);
        }
        reached
    }

    /// Drop every group whose receivers have all gone away. Returns how many
    /// were removed.
    pub async fn prune_idle(&self) -> usize {
        let mut groups = self.groups.write().await;
        let before = groups.len();
        groups.retain(|_, group| group.subscriber_count() > 0);
        let removed = before - groups.len();
        if removed > 0 {
            log::debug!("pruned {removed} idle broadcast topics");
        }
        removed
    }

    /// Topics that currently have a group.
    pub async fn topic_count(&self) -> usize {
        self.groups.read().await.len()
    }

    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub async fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            events_published: self.events_published(),
            events_unobserved: self.unobserved.load(Ordering::Relaxed),
            topics: self.topic_count().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_event() -> CollabEvent {
        CollabEvent::MemberAdded { workspace_id: Uuid::new_v4(), user_id: Uuid::new_v4() }
    }

    #[tokio::test]
    async fn test_group_fan_out() {
        let group = BroadcastGroup::new(16);
        let mut rx1 = group.subscribe();
        let mut rx2 = group.subscribe();

        let count = group.publish(Arc::new(sample_event()));
        assert_eq!(count, 2);

        let a = rx1.recv().await.unwrap();
        let b = rx2.recv().await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_group_without_subscribers_reaches_nobody() {
        let group = BroadcastGroup::new(4);
        assert_eq!(group.publish(Arc::new(sample_event())), 0);
        assert_eq!(group.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_hub_same_topic_same_group() {
        let hub = BroadcastHub::new(16);
        let room = Topic::Room(Uuid::new_v4());

        let mut rx1 = hub.subscribe(room).await;
        let mut rx2 = hub.subscribe(room).await;
        assert_eq!(hub.topic_count().await, 1);

        assert_eq!(hub.publish(room, sample_event()).await, 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_hub_topics_isolated() {
        let hub = BroadcastHub::new(16);
        let a = Topic::Room(Uuid::new_v4());
        let b = Topic::Room(Uuid::new_v4());

        let mut rx_a = hub.subscribe(a).await;
        let mut rx_b = hub.subscribe(b).await;

        hub.publish(a, sample_event()).await;
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_creates_no_group() {
        let hub = BroadcastHub::new(16);
        for _ in 0..10 {
            hub.publish(Topic::Document(Uuid::new_v4()), sample_event()).await;
        }

        let stats = hub.stats().await;
        assert_eq!(stats.topics, 0);
        assert_eq!(stats.events_published, 10);
        assert_eq!(stats.events_unobserved, 10);
    }

    #[tokio::test]
    async fn test_prune_idle_keeps_live_topics() {
        let hub = BroadcastHub::new(16);
        let live = Topic::Room(Uuid::new_v4());
        let idle = Topic::Document(Uuid::new_v4());

        let _rx = hub.subscribe(live).await;
        let rx = hub.subscribe(idle).await;
        assert_eq!(hub.prune_idle().await, 0);

        drop(rx);
        assert_eq!(hub.prune_idle().await, 1);
        assert_eq!(hub.topic_count().await, 1);

        // A later subscriber recreates the pruned topic.
        let mut rx = hub.subscribe(idle).await;
        assert_eq!(hub.publish(idle, sample_event()).await, 1);
        assert!(rx.try_recv().is_ok());
    }
}
