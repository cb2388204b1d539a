//! REST API handlers.
//!
//! Each handler reads from the `Registry` and returns JSON responses.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fleetwatch_metrics::render_prometheus;
use fleetwatch_state::{InstanceRecord, RequestRecord, SchedulerSnapshot};

use crate::ApiState;
use crate::forward::InferenceRequest;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Health ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    ApiResponse::ok(Health {
        status: "healthy",
        timestamp: Utc::now(),
    })
}

// ── Metrics queries ────────────────────────────────────────────

#[derive(Serialize)]
struct InstanceList {
    instances: Vec<InstanceRecord>,
    timestamp: DateTime<Utc>,
}

/// GET /api/v1/metrics/instances
pub async fn list_instances(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(InstanceList {
        instances: state.registry.instances().await,
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
struct SchedulerView {
    metrics: SchedulerSnapshot,
    timestamp: DateTime<Utc>,
}

/// GET /api/v1/metrics/scheduler
pub async fn scheduler_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(SchedulerView {
        metrics: state.registry.scheduler().await,
        timestamp: Utc::now(),
    })
}

const DEFAULT_REQUEST_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct RequestsQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct RequestList {
    requests: Vec<RequestRecord>,
    timestamp: DateTime<Utc>,
}

/// GET /api/v1/metrics/requests?limit=N
pub async fn recent_requests(
    State(state): State<ApiState>,
    Query(query): Query<RequestsQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(DEFAULT_REQUEST_LIMIT);
    ApiResponse::ok(RequestList {
        requests: state.registry.recent_requests(limit).await,
        timestamp: Utc::now(),
    })
}

// ── Inference ──────────────────────────────────────────────────

/// POST /api/v1/inference
pub async fn submit_inference(
    State(state): State<ApiState>,
    Json(req): Json<InferenceRequest>,
) -> impl IntoResponse {
    match state.forwarder.forward(req).await {
        Ok(resp) => ApiResponse::ok(resp).into_response(),
        Err(e) => e.into_response(),
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.registry.snapshot().await;
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render_prometheus(&snapshot),
    )
}
