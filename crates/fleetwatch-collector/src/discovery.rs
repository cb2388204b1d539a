//! Instance discovery through the scheduler's listing endpoint.
//!
//! The scheduler answers `GET /api/v1/instances` with
//! `{"instances": [{"name", "url", "variant"?, "status"?}, ...]}`. A failed
//! fetch never empties the fleet: the last successfully discovered set is
//! returned instead.

use std::collections::BTreeMap;
use std::time::Duration;

use fleetwatch_state::{InstanceRecord, InstanceStatus, InstanceVariant};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::fetch::{FetchError, HttpFetcher};

/// One instance as advertised by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredInstance {
    pub name: String,
    pub url: String,
    pub variant: InstanceVariant,
    pub status: InstanceStatus,
}

impl DiscoveredInstance {
    /// Baseline record for an instance seen for the first time.
    pub fn to_record(&self) -> InstanceRecord {
        InstanceRecord::new(&self.name, &self.url, self.variant, self.status)
    }

    /// Refresh the identity fields of an existing record. Metrics and
    /// status belong to the collector and are left alone.
    pub fn refresh(&self, record: &mut InstanceRecord) {
        record.url.clone_from(&self.url);
        record.variant = self.variant;
    }
}

#[derive(Deserialize)]
struct Listing {
    #[serde(default)]
    instances: Vec<ListedInstance>,
}

#[derive(Deserialize)]
struct ListedInstance {
    name: String,
    url: String,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl From<ListedInstance> for DiscoveredInstance {
    fn from(listed: ListedInstance) -> Self {
        Self {
            name: listed.name,
            url: listed.url,
            variant: listed
                .variant
                .as_deref()
                .map(InstanceVariant::from_label)
                .unwrap_or_default(),
            status: listed
                .status
                .as_deref()
                .map(InstanceStatus::from_label)
                .unwrap_or_default(),
        }
    }
}

/// Lists the fleet from the scheduler and remembers the last good answer.
pub struct DiscoveryClient {
    fetcher: HttpFetcher,
    endpoint: String,
    timeout: Duration,
    last_known: Mutex<Vec<DiscoveredInstance>>,
}

impl DiscoveryClient {
    pub fn new(fetcher: HttpFetcher, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            fetcher,
            endpoint: endpoint.into(),
            timeout,
            last_known: Mutex::new(Vec::new()),
        }
    }

    /// Current set of instances, falling back to the last known set when
    /// the scheduler cannot be reached or answers with garbage.
    pub async fn discover(&self) -> Vec<DiscoveredInstance> {
        let fetched = self.fetch().await;
        let mut last_known = self.last_known.lock().await;
        match fetched {
            Ok(found) => {
                debug!(count = found.len(), "discovered instances");
                last_known.clone_from(&found);
                found
            }
            Err(e) => {
                warn!(
                    endpoint = %self.endpoint,
                    error = %e,
                    cached = last_known.len(),
                    "instance discovery failed, using last known set"
                );
                last_known.clone()
            }
        }
    }

    /// The set returned by the last successful discovery.
    pub async fn last_known(&self) -> Vec<DiscoveredInstance> {
        self.last_known.lock().await.clone()
    }

    async fn fetch(&self) -> Result<Vec<DiscoveredInstance>, FetchError> {
        let listing: Listing = self
            .fetcher
            .get(&self.endpoint, self.timeout)
            .await?
            .error_for_status()?
            .json()?;

        // Names are unique; a repeated name keeps its last entry.
        let unique: BTreeMap<String, DiscoveredInstance> = listing
            .instances
            .into_iter()
            .map(DiscoveredInstance::from)
            .map(|d| (d.name.clone(), d))
            .collect();
        Ok(unique.into_values().collect())
    }
}
