//! Domain types for the fleet view.
//!
//! These types describe backend instances, recorded inference requests,
//! scheduler routing statistics, and the serialized snapshot pushed to
//! subscribers. All types are serializable to/from JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a backend instance.
pub type InstanceName = String;

// ── Instance ──────────────────────────────────────────────────────

/// Functional role of an inference-serving instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstanceVariant {
    #[default]
    Standard,
    Prefill,
    Decode,
}

impl InstanceVariant {
    /// Parse a variant label, falling back to `Standard` for anything
    /// unrecognised.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "prefill" => Self::Prefill,
            "decode" => Self::Decode,
            _ => Self::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Prefill => "prefill",
            Self::Decode => "decode",
        }
    }
}

/// Last observed liveness of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// Not polled yet.
    #[default]
    Unknown,
    /// Health probe returned 2xx.
    Healthy,
    /// Health probe returned a non-2xx status.
    Unhealthy,
    /// A fetch failed outright (connection error, timeout, bad body).
    Error,
}

impl InstanceStatus {
    /// Parse a status label, falling back to `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "healthy" => Self::Healthy,
            "unhealthy" => Self::Unhealthy,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

/// Last-known state of a single backend instance.
///
/// `gpu_memory_used_gb <= gpu_memory_total_gb` is expected but not
/// enforced; upstream exporters can report inconsistent pairs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceRecord {
    pub name: InstanceName,
    /// Base URL (scheme + authority), e.g. `http://10.0.0.4:8000`.
    pub url: String,
    pub variant: InstanceVariant,
    pub status: InstanceStatus,
    pub gpu_memory_used_gb: f64,
    pub gpu_memory_total_gb: f64,
    pub queue_length: u64,
    /// Prefix-cache hit rate, expected in [0, 1].
    pub cache_hit_rate: f64,
    pub tokens_per_second: f64,
    pub active_requests: u64,
    /// Time of the last poll attempt, successful or not.
    pub last_updated: DateTime<Utc>,
}

impl InstanceRecord {
    /// A freshly discovered instance with a zeroed baseline.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        variant: InstanceVariant,
        status: InstanceStatus,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            variant,
            status,
            gpu_memory_used_gb: 0.0,
            gpu_memory_total_gb: 0.0,
            queue_length: 0,
            cache_hit_rate: 0.0,
            tokens_per_second: 0.0,
            active_requests: 0,
            last_updated: Utc::now(),
        }
    }
}

// ── Requests ──────────────────────────────────────────────────────

/// Outcome of one inference request relayed through the scheduler.
///
/// Immutable once recorded. Latencies are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestRecord {
    pub request_id: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub time_to_first_token: f64,
    pub time_between_tokens: f64,
    pub total_latency: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_hit: bool,
    /// Name of the instance that served the request.
    pub instance: String,
    pub variant: InstanceVariant,
}

// ── Scheduler ─────────────────────────────────────────────────────

/// Routing statistics scraped from the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SchedulerSnapshot {
    pub routing_decisions: u64,
    pub cache_aware_routes: u64,
    pub load_balanced_routes: u64,
    pub failed_routes: u64,
    pub avg_routing_time_ms: f64,
    pub instances_discovered: u64,
    pub healthy_instances: u64,
}

// ── Snapshot ──────────────────────────────────────────────────────

/// Derived fleet-wide aggregates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FleetSummary {
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub total_active_requests: u64,
    /// `sum(cache_hit_rate) / max(instance_count, 1)`.
    pub avg_cache_hit_rate: f64,
    pub total_tokens_per_second: f64,
}

impl FleetSummary {
    pub fn from_instances(instances: &[InstanceRecord]) -> Self {
        let total_instances = instances.len();
        let hit_rate_sum: f64 = instances.iter().map(|i| i.cache_hit_rate).sum();

        Self {
            total_instances,
            healthy_instances: instances
                .iter()
                .filter(|i| i.status == InstanceStatus::Healthy)
                .count(),
            total_active_requests: instances.iter().map(|i| i.active_requests).sum(),
            avg_cache_hit_rate: hit_rate_sum / total_instances.max(1) as f64,
            total_tokens_per_second: instances.iter().map(|i| i.tokens_per_second).sum(),
        }
    }
}

/// A consistent point-in-time copy of fleet, scheduler, and request state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FleetSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Ordered by instance name.
    pub instances: Vec<InstanceRecord>,
    pub scheduler_metrics: SchedulerSnapshot,
    /// Tail of the request history, oldest first.
    pub recent_requests: Vec<RequestRecord>,
    pub summary: FleetSummary,
}
