//! Per-instance polling: a health probe plus a metrics scrape.

use std::time::Duration;

use chrono::Utc;
use fleetwatch_metrics::{InstanceMetrics, parse};
use fleetwatch_state::{InstanceRecord, InstanceStatus};
use tracing::{debug, warn};

use crate::fetch::{FetchError, FetchResponse, HttpFetcher, join_url};

const HEALTH_PATH: &str = "/health";
const METRICS_PATH: &str = "/metrics";

/// Polls a single instance and folds the result into its record.
#[derive(Clone)]
pub struct InstanceCollector {
    fetcher: HttpFetcher,
    timeout: Duration,
    model: Option<String>,
}

impl InstanceCollector {
    pub fn new(fetcher: HttpFetcher, timeout: Duration, model: Option<String>) -> Self {
        Self {
            fetcher,
            timeout,
            model,
        }
    }

    /// Poll `record`'s instance and return the updated record.
    ///
    /// - health 2xx → `healthy`, other status → `unhealthy`
    /// - metrics 2xx → recognised fields overwritten, others kept
    /// - metrics non-2xx → no metric data this cycle
    /// - any fetch failure → `error`, metric fields untouched
    ///
    /// `last_updated` is set in every case.
    pub async fn collect(&self, mut record: InstanceRecord) -> InstanceRecord {
        let health_url = join_url(&record.url, HEALTH_PATH);
        let metrics_url = join_url(&record.url, METRICS_PATH);

        let (health, metrics) = tokio::join!(
            self.fetcher.get(&health_url, self.timeout),
            self.fetcher.get(&metrics_url, self.timeout),
        );
        record.last_updated = Utc::now();

        match self.evaluate(health, metrics) {
            Ok((status, metrics)) => {
                record.status = status;
                if let Some(metrics) = metrics {
                    metrics.apply(&mut record);
                }
            }
            Err(e) => {
                warn!(
                    instance = %record.name,
                    url = %record.url,
                    error = %e,
                    "instance poll failed"
                );
                record.status = InstanceStatus::Error;
            }
        }
        record
    }

    fn evaluate(
        &self,
        health: Result<FetchResponse, FetchError>,
        metrics: Result<FetchResponse, FetchError>,
    ) -> Result<(InstanceStatus, Option<InstanceMetrics>), FetchError> {
        let status = if health?.is_success() {
            InstanceStatus::Healthy
        } else {
            InstanceStatus::Unhealthy
        };

        let metrics = metrics?;
        if !metrics.is_success() {
            debug!(status = %metrics.status, "metrics endpoint returned non-success");
            return Ok((status, None));
        }
        let parsed = InstanceMetrics::from_samples(parse(metrics.text()?), self.model.as_deref());
        Ok((status, Some(parsed)))
    }
}
