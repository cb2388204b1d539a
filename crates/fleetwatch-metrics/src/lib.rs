//! fleetwatch-metrics: metrics text handling for Fleetwatch.
//!
//! Parses the Prometheus text exposition served by inference instances
//! and the scheduler, maps recognised metric names onto fleet state, and
//! renders the aggregated view back out as exposition text.
//!
//! # Architecture
//!
//! ```text
//! exposition::parse(text) → Iterator<Sample>
//!   ├── InstanceMetrics::from_samples() → partial InstanceRecord update
//!   └── scheduler::snapshot_from_samples() → full SchedulerSnapshot
//!
//! render_prometheus(FleetSnapshot) → text/plain for /metrics
//! ```
//!
//! Unrecognised metric names are ignored by the mappers; the parser itself
//! never fails, it skips comment and malformed lines.

pub mod exposition;
pub mod instance;
pub mod prometheus;
pub mod scheduler;

pub use exposition::{Sample, latest, parse};
pub use instance::InstanceMetrics;
pub use prometheus::render_prometheus;
pub use scheduler::snapshot_from_samples;
