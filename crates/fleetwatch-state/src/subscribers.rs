//! Subscriber set: live connections that receive snapshot broadcasts.
//!
//! Each subscriber owns a bounded queue. The broadcaster copies the current
//! sender list before delivering, so registration and removal can happen
//! concurrently with an in-flight broadcast.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use tracing::debug;

/// Identifier handed out to each subscriber at registration.
pub type SubscriberId = u64;

/// Messages buffered per subscriber before sends start dropping.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 16;

/// Receiving half of a registered subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<str>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next serialized snapshot.
    ///
    /// Returns `None` once the subscriber has been removed from the set.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for tests and draining.
    pub fn try_recv(&mut self) -> Option<Arc<str>> {
        self.rx.try_recv().ok()
    }
}

/// Concurrency-safe set of subscriber queues.
#[derive(Clone, Default)]
pub struct SubscriberSet {
    senders: Arc<RwLock<HashMap<SubscriberId, mpsc::Sender<Arc<str>>>>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub async fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        self.senders.write().await.insert(id, tx);
        debug!(subscriber = id, "subscriber registered");
        Subscription { id, rx }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.senders.write().await.remove(&id).is_some();
        if removed {
            debug!(subscriber = id, "subscriber removed");
        }
        removed
    }

    /// Copy of the current sender list, taken under a short read lock.
    pub async fn senders(&self) -> Vec<(SubscriberId, mpsc::Sender<Arc<str>>)> {
        self.senders
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.senders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.senders.read().await.is_empty()
    }

    /// Drop every subscriber queue, which ends all open streams.
    pub async fn clear(&self) {
        let mut senders = self.senders.write().await;
        let count = senders.len();
        senders.clear();
        debug!(count, "all subscribers released");
    }
}
