//! Scheduler metrics scrape for routing and cache statistics.

use std::time::Duration;

use fleetwatch_metrics::{parse, snapshot_from_samples};
use fleetwatch_state::SchedulerSnapshot;
use tracing::warn;

use crate::fetch::{FetchError, HttpFetcher};

/// Scrapes the scheduler's routing statistics.
pub struct SchedulerCollector {
    fetcher: HttpFetcher,
    endpoint: String,
    timeout: Duration,
}

impl SchedulerCollector {
    pub fn new(fetcher: HttpFetcher, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// A fresh snapshot on success, `previous` unchanged on any failure.
    pub async fn collect(&self, previous: &SchedulerSnapshot) -> SchedulerSnapshot {
        match self.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    endpoint = %self.endpoint,
                    error = %e,
                    "scheduler scrape failed, keeping previous snapshot"
                );
                previous.clone()
            }
        }
    }

    async fn fetch(&self) -> Result<SchedulerSnapshot, FetchError> {
        let resp = self
            .fetcher
            .get(&self.endpoint, self.timeout)
            .await?
            .error_for_status()?;
        Ok(snapshot_from_samples(parse(resp.text()?)))
    }
}
