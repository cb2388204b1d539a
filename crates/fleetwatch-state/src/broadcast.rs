//! Snapshot broadcaster: pushes the registry view to every subscriber.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

use crate::registry::Registry;

/// Outcome of a single `publish()` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers whose queue accepted the message.
    pub delivered: usize,
    /// Subscribers removed because their connection had closed.
    pub pruned: usize,
    /// Subscribers that missed this message because their queue was full.
    pub dropped: usize,
}

/// Serializes registry snapshots and fans them out.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Registry,
}

impl Broadcaster {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Deliver the current snapshot to all registered subscribers.
    ///
    /// With no subscribers this returns immediately without taking or
    /// serializing a snapshot. Delivery never blocks on a slow subscriber.
    pub async fn publish(&self) -> PublishReport {
        let subscribers = self.registry.subscribers();
        let targets = subscribers.senders().await;
        if targets.is_empty() {
            return PublishReport::default();
        }

        let snapshot = self.registry.snapshot().await;
        let message: Arc<str> = match serde_json::to_string(&snapshot) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(error = %e, "failed to serialize fleet snapshot");
                return PublishReport::default();
            }
        };

        let mut report = PublishReport::default();
        for (id, tx) in targets {
            match tx.try_send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscriber = id, "subscriber queue full, snapshot dropped");
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    subscribers.unsubscribe(id).await;
                    report.pruned += 1;
                }
            }
        }

        debug!(
            delivered = report.delivered,
            pruned = report.pruned,
            dropped = report.dropped,
            bytes = message.len(),
            "snapshot published"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscribers::SUBSCRIBER_QUEUE_CAPACITY;
    use crate::types::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let registry = Registry::new();
        let report = Broadcaster::new(registry).publish().await;
        assert_eq!(report, PublishReport::default());
    }

    #[tokio::test]
    async fn closed_subscriber_is_pruned_and_others_still_receive() {
        let registry = Registry::new();
        let broadcaster = Broadcaster::new(registry.clone());

        let mut alive = registry.subscribers().subscribe().await;
        let closed = registry.subscribers().subscribe().await;
        drop(closed);

        let report = broadcaster.publish().await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.pruned, 1);
        assert_eq!(registry.subscribers().len().await, 1);

        assert!(alive.try_recv().is_some());
    }

    #[tokio::test]
    async fn payload_has_snapshot_shape() {
        let registry = Registry::new();
        registry
            .upsert(InstanceRecord::new(
                "prefill-0",
                "http://prefill-0:8000",
                InstanceVariant::Prefill,
                InstanceStatus::Healthy,
            ))
            .await;
        let mut sub = registry.subscribers().subscribe().await;

        Broadcaster::new(registry).publish().await;

        let msg = sub.try_recv().expect("message delivered");
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["instances"][0]["name"], "prefill-0");
        assert_eq!(value["instances"][0]["variant"], "prefill");
        assert_eq!(value["summary"]["total_instances"], 1);
        assert_eq!(value["summary"]["healthy_instances"], 1);
        assert!(value["scheduler_metrics"].is_object());
        assert!(value["recent_requests"].as_array().unwrap().is_empty());
        assert!(value["timestamp"].is_string());
    }

    #[tokio::test]
    async fn full_queue_drops_message_but_keeps_subscriber() {
        let registry = Registry::new();
        let broadcaster = Broadcaster::new(registry.clone());
        let mut sub = registry.subscribers().subscribe().await;

        for _ in 0..SUBSCRIBER_QUEUE_CAPACITY {
            assert_eq!(broadcaster.publish().await.delivered, 1);
        }
        let report = broadcaster.publish().await;
        assert_eq!(report.dropped, 1);
        assert_eq!(registry.subscribers().len().await, 1);

        // Draining makes room again.
        assert!(sub.try_recv().is_some());
        assert_eq!(broadcaster.publish().await.delivered, 1);
    }
}
