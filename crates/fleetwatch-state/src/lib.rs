//! fleetwatch-state: in-memory fleet state for Fleetwatch.
//!
//! Holds the authoritative view of the monitored fleet: one
//! `InstanceRecord` per backend instance, the latest scheduler snapshot,
//! and a bounded history of recent inference requests. Live subscribers
//! register here and receive serialized snapshots from the `Broadcaster`.
//!
//! # Architecture
//!
//! ```text
//! Registry (Clone, Arc-backed)
//!   ├── instances: name → InstanceRecord (ordered by name)
//!   ├── scheduler: SchedulerSnapshot (replaced wholesale)
//!   ├── requests: last 1000 RequestRecord
//!   └── subscribers: SubscriberSet (per-connection bounded queues)
//!
//! Broadcaster
//!   └── publish() → snapshot() → JSON → every subscriber queue
//! ```
//!
//! No lock is held while a snapshot is serialized or delivered; readers
//! always observe a complete prior state, possibly one cycle stale.

pub mod broadcast;
pub mod registry;
pub mod subscribers;
pub mod types;

pub use broadcast::{Broadcaster, PublishReport};
pub use registry::{BROADCAST_REQUEST_LIMIT, REQUEST_HISTORY_LIMIT, Registry};
pub use subscribers::{SubscriberId, SubscriberSet, Subscription};
pub use types::*;
