//! Mapping of scheduler metrics onto a `SchedulerSnapshot`.

use fleetwatch_state::SchedulerSnapshot;

use crate::exposition::Sample;
use crate::instance::{count, gauge};

pub const ROUTING_DECISIONS: &str = "llmd_routing_decisions_total";
pub const CACHE_AWARE_ROUTES: &str = "llmd_cache_aware_routes_total";
pub const LOAD_BALANCED_ROUTES: &str = "llmd_load_balanced_routes_total";
pub const FAILED_ROUTES: &str = "llmd_failed_routes_total";
pub const AVG_ROUTING_TIME_MS: &str = "llmd_avg_routing_time_ms";
pub const INSTANCES_DISCOVERED: &str = "llmd_instances_discovered";
pub const HEALTHY_INSTANCES: &str = "llmd_healthy_instances";

/// Build a fresh snapshot from one successful scrape.
///
/// Fields whose metric is missing are zero; nothing carries over from an
/// earlier snapshot.
pub fn snapshot_from_samples<I>(samples: I) -> SchedulerSnapshot
where
    I: IntoIterator<Item = Sample>,
{
    let mut snap = SchedulerSnapshot::default();
    for sample in samples {
        let value = sample.value;
        match sample.name.as_str() {
            ROUTING_DECISIONS => snap.routing_decisions = count(value).unwrap_or(0),
            CACHE_AWARE_ROUTES => snap.cache_aware_routes = count(value).unwrap_or(0),
            LOAD_BALANCED_ROUTES => snap.load_balanced_routes = count(value).unwrap_or(0),
            FAILED_ROUTES => snap.failed_routes = count(value).unwrap_or(0),
            AVG_ROUTING_TIME_MS => snap.avg_routing_time_ms = gauge(value).unwrap_or(0.0),
            INSTANCES_DISCOVERED => snap.instances_discovered = count(value).unwrap_or(0),
            HEALTHY_INSTANCES => snap.healthy_instances = count(value).unwrap_or(0),
            _ => {}
        }
    }
    snap
}
