//! The fleet registry: single source of truth for instance, scheduler,
//! and request state.
//!
//! `Registry` is `Clone` (backed by `Arc`) and is constructed once by the
//! daemon and handed to every component that needs it. One writer (the
//! collection loop) mutates instance and scheduler state per cycle;
//! request records arrive from the inference relay.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::subscribers::SubscriberSet;
use crate::types::*;

/// Maximum number of request records retained.
pub const REQUEST_HISTORY_LIMIT: usize = 1000;

/// Number of most recent request records embedded in a snapshot.
pub const BROADCAST_REQUEST_LIMIT: usize = 50;

#[derive(Default)]
struct FleetState {
    /// Keyed by instance name; `BTreeMap` gives snapshots a stable order.
    instances: BTreeMap<InstanceName, InstanceRecord>,
    scheduler: SchedulerSnapshot,
    requests: VecDeque<RequestRecord>,
}

/// Shared handle to the fleet view.
#[derive(Clone, Default)]
pub struct Registry {
    state: Arc<RwLock<FleetState>>,
    subscribers: SubscriberSet,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Instances ─────────────────────────────────────────────────

    /// Overwrite every field of an instance record, creating it if absent.
    pub async fn upsert(&self, record: InstanceRecord) {
        let mut state = self.state.write().await;
        if !state.instances.contains_key(&record.name) {
            debug!(instance = %record.name, url = %record.url, "instance registered");
        }
        state.instances.insert(record.name.clone(), record);
    }

    /// The record for `name`, if the instance has ever been seen.
    pub async fn get_instance(&self, name: &str) -> Option<InstanceRecord> {
        self.state.read().await.instances.get(name).cloned()
    }

    /// All instance records, ordered by name.
    pub async fn instances(&self) -> Vec<InstanceRecord> {
        self.state.read().await.instances.values().cloned().collect()
    }

    /// Number of instances tracked, including ones no longer listed.
    pub async fn instance_count(&self) -> usize {
        self.state.read().await.instances.len()
    }

    // ── Scheduler ─────────────────────────────────────────────────

    /// Replace the scheduler snapshot wholesale.
    pub async fn set_scheduler(&self, snapshot: SchedulerSnapshot) {
        self.state.write().await.scheduler = snapshot;
    }

    pub async fn scheduler(&self) -> SchedulerSnapshot {
        self.state.read().await.scheduler.clone()
    }

    // ── Requests ──────────────────────────────────────────────────

    /// Append a request record, trimming history to the last
    /// `REQUEST_HISTORY_LIMIT` entries.
    pub async fn record_request(&self, record: RequestRecord) {
        let mut state = self.state.write().await;
        state.requests.push_back(record);
        while state.requests.len() > REQUEST_HISTORY_LIMIT {
            state.requests.pop_front();
        }
    }

    /// The `limit` most recent request records, oldest first.
    pub async fn recent_requests(&self, limit: usize) -> Vec<RequestRecord> {
        let state = self.state.read().await;
        let skip = state.requests.len().saturating_sub(limit);
        state.requests.iter().skip(skip).cloned().collect()
    }

    pub async fn request_count(&self) -> usize {
        self.state.read().await.requests.len()
    }

    // ── Snapshot ──────────────────────────────────────────────────

    /// Copy out a consistent view of the whole fleet.
    ///
    /// The read lock is released before the caller serializes or sends
    /// anything.
    pub async fn snapshot(&self) -> FleetSnapshot {
        let (instances, scheduler_metrics, recent_requests) = {
            let state = self.state.read().await;
            let skip = state.requests.len().saturating_sub(BROADCAST_REQUEST_LIMIT);
            (
                state.instances.values().cloned().collect::<Vec<_>>(),
                state.scheduler.clone(),
                state.requests.iter().skip(skip).cloned().collect::<Vec<_>>(),
            )
        };

        let summary = FleetSummary::from_instances(&instances);
        FleetSnapshot {
            timestamp: Utc::now(),
            instances,
            scheduler_metrics,
            recent_requests,
            summary,
        }
    }

    // ── Subscribers ───────────────────────────────────────────────

    /// Live subscribers attached to this registry.
    pub fn subscribers(&self) -> &SubscriberSet {
        &self.subscribers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(n: usize) -> RequestRecord {
        RequestRecord {
            request_id: format!("req_{n}"),
            model: "llama-3.2-1b".to_string(),
            timestamp: Utc::now(),
            time_to_first_token: 0.05,
            time_between_tokens: 0.01,
            total_latency: 0.8,
            input_tokens: 12,
            output_tokens: 40,
            cache_hit: n % 2 == 0,
            instance: "decode-0".to_string(),
            variant: InstanceVariant::Decode,
        }
    }

    fn instance(name: &str) -> InstanceRecord {
        InstanceRecord::new(
            name,
            format!("http://{name}:8000"),
            InstanceVariant::Standard,
            InstanceStatus::Unknown,
        )
    }

    #[tokio::test]
    async fn upsert_creates_then_overwrites() {
        let registry = Registry::new();
        registry.upsert(instance("a")).await;
        assert_eq!(registry.instance_count().await, 1);

        let mut updated = instance("a");
        updated.status = InstanceStatus::Healthy;
        updated.queue_length = 7;
        registry.upsert(updated.clone()).await;

        assert_eq!(registry.instance_count().await, 1);
        assert_eq!(registry.get_instance("a").await, Some(updated));
    }

    #[tokio::test]
    async fn instances_are_ordered_by_name() {
        let registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.upsert(instance(name)).await;
        }
        let names: Vec<_> = registry
            .instances()
            .await
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn history_is_capped_at_limit() {
        let registry = Registry::new();
        let total = REQUEST_HISTORY_LIMIT + 234;
        for n in 1..=total {
            registry.record_request(request(n)).await;
        }

        assert_eq!(registry.request_count().await, REQUEST_HISTORY_LIMIT);

        let all = registry.recent_requests(usize::MAX).await;
        assert_eq!(all.len(), REQUEST_HISTORY_LIMIT);
        assert_eq!(all.first().unwrap().request_id, format!("req_{}", total - 999));
        assert_eq!(all.last().unwrap().request_id, format!("req_{total}"));
        // Arrival order is preserved.
        assert!(all.windows(2).all(|w| {
            let a: usize = w[0].request_id[4..].parse().unwrap();
            let b: usize = w[1].request_id[4..].parse().unwrap();
            b == a + 1
        }));
    }

    #[tokio::test]
    async fn history_below_limit_is_untouched() {
        let registry = Registry::new();
        for n in 1..=10 {
            registry.record_request(request(n)).await;
        }
        assert_eq!(registry.request_count().await, 10);
        assert_eq!(registry.recent_requests(3).await.len(), 3);
        assert_eq!(registry.recent_requests(3).await[0].request_id, "req_8");
    }

    #[tokio::test]
    async fn snapshot_embeds_tail_of_history() {
        let registry = Registry::new();
        for n in 1..=120 {
            registry.record_request(request(n)).await;
        }

        let snap = registry.snapshot().await;
        assert_eq!(snap.recent_requests.len(), BROADCAST_REQUEST_LIMIT);
        assert_eq!(snap.recent_requests, registry.recent_requests(BROADCAST_REQUEST_LIMIT).await);
        assert_eq!(snap.recent_requests.last().unwrap().request_id, "req_120");
    }

    #[tokio::test]
    async fn snapshot_with_short_history() {
        let registry = Registry::new();
        registry.record_request(request(1)).await;
        let snap = registry.snapshot().await;
        assert_eq!(snap.recent_requests.len(), 1);
    }

    #[tokio::test]
    async fn scheduler_is_replaced_wholesale() {
        let registry = Registry::new();
        registry
            .set_scheduler(SchedulerSnapshot {
                routing_decisions: 10,
                failed_routes: 2,
                ..Default::default()
            })
            .await;
        registry
            .set_scheduler(SchedulerSnapshot {
                routing_decisions: 11,
                ..Default::default()
            })
            .await;

        let sched = registry.scheduler().await;
        assert_eq!(sched.routing_decisions, 11);
        assert_eq!(sched.failed_routes, 0);
    }

    #[tokio::test]
    async fn snapshot_summary_matches_instances() {
        let registry = Registry::new();
        let mut a = instance("a");
        a.status = InstanceStatus::Healthy;
        a.cache_hit_rate = 0.5;
        registry.upsert(a).await;
        registry.upsert(instance("b")).await;

        let snap = registry.snapshot().await;
        assert_eq!(snap.summary.total_instances, 2);
        assert_eq!(snap.summary.healthy_instances, 1);
        assert!((snap.summary.avg_cache_hit_rate - 0.25).abs() < 1e-9);
    }
}
