//! Collector settings and their validation.

use std::time::Duration;

use thiserror::Error;

use crate::fetch::join_url;

pub const DEFAULT_SCHEDULER_URL: &str = "http://llm-d-scheduler.llm-d-demo.svc.cluster.local:8080";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

const DISCOVERY_PATH: &str = "/api/v1/instances";
const SCHEDULER_METRICS_PATH: &str = "/metrics";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("scheduler url must be an absolute http:// url, got {0:?}")]
    SchedulerUrl(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Settings for the collection loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    /// Base URL of the scheduler, without a trailing slash.
    pub scheduler_url: String,
    /// Pause between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Timeout applied to every individual fetch.
    pub fetch_timeout: Duration,
    /// When set, only samples for this model name are considered.
    pub model: Option<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            scheduler_url: DEFAULT_SCHEDULER_URL.to_string(),
            interval: DEFAULT_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            model: None,
        }
    }
}

impl CollectorConfig {
    pub fn new(scheduler_url: impl Into<String>) -> Self {
        Self {
            scheduler_url: scheduler_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Set the pause between cycles.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the per-fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Restrict metric samples to one model; an empty name means no filter.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.is_empty());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.scheduler_url;
        let host = url.strip_prefix("http://").unwrap_or_default();
        if host.is_empty() || host.starts_with('/') {
            return Err(ConfigError::SchedulerUrl(url.clone()));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroDuration("collection interval"));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("fetch timeout"));
        }
        Ok(())
    }

    pub fn discovery_endpoint(&self) -> String {
        join_url(&self.scheduler_url, DISCOVERY_PATH)
    }

    pub fn scheduler_metrics_endpoint(&self) -> String {
        join_url(&self.scheduler_url, SCHEDULER_METRICS_PATH)
    }
}
