//! Inference relay: forwards a prompt to the scheduler's chat-completions
//! endpoint and records the outcome in the request history.

use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use fleetwatch_collector::{FetchError, HttpFetcher, join_url};
use fleetwatch_state::{InstanceVariant, Registry, RequestRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::handlers::error_response;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";
const DEMO_SOURCE: &str = "fleetwatch";

fn default_max_tokens() -> u32 {
    100
}

fn default_temperature() -> f64 {
    0.7
}

fn default_priority() -> String {
    "standard".to_string()
}

/// Body of `POST /api/v1/inference`.
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// interactive, standard or batch; passed through untouched.
    #[serde(default = "default_priority")]
    pub priority: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InferenceResponse {
    pub request_id: String,
    pub response: String,
    pub metrics: RequestRecord,
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("scheduler returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("scheduler unreachable: {0}")]
    Unreachable(#[from] FetchError),
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Upstream { status, .. } => *status,
            Self::Unreachable(_) => StatusCode::BAD_GATEWAY,
        };
        error_response(&format!("inference request failed: {self}"), status).into_response()
    }
}

/// Relays inference requests to the scheduler and records their latency.
pub struct InferenceForwarder {
    fetcher: HttpFetcher,
    endpoint: String,
    timeout: Duration,
    registry: Registry,
}

impl InferenceForwarder {
    pub fn new(
        fetcher: HttpFetcher,
        scheduler_url: &str,
        timeout: Duration,
        registry: Registry,
    ) -> Self {
        Self {
            fetcher,
            endpoint: join_url(scheduler_url, COMPLETIONS_PATH),
            timeout,
            registry,
        }
    }

    /// Relay one request. Only successful completions are recorded.
    pub async fn forward(&self, req: InferenceRequest) -> Result<InferenceResponse, ForwardError> {
        let request_id = format!("req_{}", Utc::now().timestamp_millis());
        let payload = json!({
            "model": req.model,
            "messages": [{"role": "user", "content": req.prompt}],
            "max_tokens": req.max_tokens,
            "temperature": req.temperature,
            "stream": false,
            "metadata": {
                "request_id": request_id,
                "priority": req.priority,
                "demo_source": DEMO_SOURCE,
            },
        });

        let started = Instant::now();
        let resp = self
            .fetcher
            .post_json(&self.endpoint, &payload, self.timeout)
            .await?;
        if !resp.is_success() {
            let body = String::from_utf8_lossy(&resp.body).into_owned();
            warn!(
                request_id = %request_id,
                status = %resp.status,
                "scheduler rejected inference request"
            );
            return Err(ForwardError::Upstream {
                status: resp.status,
                body,
            });
        }
        let result: Value = resp.json()?;
        let total_latency = started.elapsed().as_secs_f64();

        let record = record_from_completion(&request_id, &req.model, &result, total_latency);
        info!(
            request_id = %record.request_id,
            instance = %record.instance,
            latency_s = record.total_latency,
            cache_hit = record.cache_hit,
            "inference request relayed"
        );
        self.registry.record_request(record.clone()).await;

        Ok(InferenceResponse {
            request_id,
            response: completion_text(&result).to_string(),
            metrics: record,
        })
    }
}

fn completion_text(result: &Value) -> &str {
    result
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn record_from_completion(
    request_id: &str,
    model: &str,
    result: &Value,
    total_latency: f64,
) -> RequestRecord {
    let metric = |key: &str| result.get("metrics").and_then(|m| m.get(key));
    let usage = |key: &str| {
        result
            .pointer(&format!("/usage/{key}"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };

    RequestRecord {
        request_id: request_id.to_string(),
        model: model.to_string(),
        timestamp: Utc::now(),
        time_to_first_token: metric("ttft").and_then(Value::as_f64).unwrap_or(0.0),
        time_between_tokens: metric("tbt").and_then(Value::as_f64).unwrap_or(0.0),
        total_latency,
        input_tokens: usage("prompt_tokens"),
        output_tokens: usage("completion_tokens"),
        cache_hit: metric("cache_hit").and_then(Value::as_bool).unwrap_or(false),
        instance: metric("instance")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        variant: metric("variant")
            .and_then(Value::as_str)
            .map(InstanceVariant::from_label)
            .unwrap_or_default(),
    }
}
