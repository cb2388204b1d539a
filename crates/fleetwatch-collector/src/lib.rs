//! fleetwatch-collector: polls the fleet and feeds the registry.
//!
//! ```text
//! CollectionLoop::run(shutdown)
//!   loop {
//!     DiscoveryClient::discover()      GET <scheduler>/api/v1/instances
//!     JoinSet<InstanceCollector>       GET <instance>/health + /metrics
//!     SchedulerCollector::collect()    GET <scheduler>/metrics
//!     Broadcaster::publish()
//!     sleep(interval) | shutdown
//!   }
//! ```
//!
//! Every upstream failure is contained: discovery falls back to the last
//! known set, a failing instance is marked `error` with its metrics kept,
//! and a failed scheduler scrape keeps the previous snapshot.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod fetch;
pub mod instance;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use config::{CollectorConfig, ConfigError};
pub use discovery::{DiscoveredInstance, DiscoveryClient};
pub use engine::{CollectionLoop, CyclePhase, CycleReport};
pub use fetch::{FetchError, FetchResponse, HttpFetcher, join_url};
pub use instance::InstanceCollector;
pub use scheduler::SchedulerCollector;
