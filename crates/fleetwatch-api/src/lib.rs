//! fleetwatch-api: HTTP surface for Fleetwatch.
//!
//! Serves the registry's fleet view over REST and WebSocket, and relays
//! inference requests to the scheduler.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Liveness of the aggregator itself |
//! | GET | `/api/v1/metrics/instances` | Current instance records |
//! | GET | `/api/v1/metrics/scheduler` | Latest scheduler snapshot |
//! | GET | `/api/v1/metrics/requests?limit=N` | Recent request records |
//! | POST | `/api/v1/inference` | Relay a prompt through the scheduler |
//! | GET | `/ws/metrics` | Live snapshot stream |
//! | GET | `/metrics` | Prometheus exposition |

pub mod forward;
pub mod handlers;
pub mod stream;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use fleetwatch_state::Registry;

pub use forward::{ForwardError, InferenceForwarder, InferenceRequest, InferenceResponse};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Registry,
    pub forwarder: Arc<InferenceForwarder>,
}

impl ApiState {
    pub fn new(registry: Registry, forwarder: InferenceForwarder) -> Self {
        Self {
            registry,
            forwarder: Arc::new(forwarder),
        }
    }
}

/// Build the complete router (REST + stream + metrics).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/metrics/instances", get(handlers::list_instances))
        .route("/metrics/scheduler", get(handlers::scheduler_metrics))
        .route("/metrics/requests", get(handlers::recent_requests))
        .route("/inference", post(handlers::submit_inference));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_routes)
        .route("/ws/metrics", get(stream::metrics_stream))
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
}
