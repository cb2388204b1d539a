//! The periodic collection loop.
//!
//! One cycle: discover → poll every instance concurrently → scrape the
//! scheduler → publish a snapshot. Cycles never overlap; the interval is
//! measured from the end of one cycle to the start of the next.

use std::time::{Duration, Instant};

use fleetwatch_state::{Broadcaster, InstanceStatus, PublishReport, Registry};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::CollectorConfig;
use crate::discovery::DiscoveryClient;
use crate::fetch::HttpFetcher;
use crate::instance::InstanceCollector;
use crate::scheduler::SchedulerCollector;

/// Where the loop currently is.
///
/// A running loop moves `Discovering → CollectingInstances →
/// CollectingScheduler → Broadcasting → Sleeping → Idle` and ends in
/// `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Discovering,
    CollectingInstances,
    CollectingScheduler,
    Broadcasting,
    Sleeping,
    /// The loop has exited after a shutdown signal.
    Stopped,
}

/// What a single cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub discovered: usize,
    pub healthy: usize,
    pub errored: usize,
    pub published: PublishReport,
    pub elapsed: Duration,
}

/// Drives discovery, polling and publishing on a fixed interval.
pub struct CollectionLoop {
    registry: Registry,
    discovery: DiscoveryClient,
    instances: InstanceCollector,
    scheduler: SchedulerCollector,
    broadcaster: Broadcaster,
    interval: Duration,
    phase: watch::Sender<CyclePhase>,
}

impl CollectionLoop {
    pub fn new(config: &CollectorConfig, registry: Registry) -> Self {
        let fetcher = HttpFetcher::new();
        let (phase, _) = watch::channel(CyclePhase::Idle);
        Self {
            discovery: DiscoveryClient::new(
                fetcher.clone(),
                config.discovery_endpoint(),
                config.fetch_timeout,
            ),
            instances: InstanceCollector::new(
                fetcher.clone(),
                config.fetch_timeout,
                config.model.clone(),
            ),
            scheduler: SchedulerCollector::new(
                fetcher,
                config.scheduler_metrics_endpoint(),
                config.fetch_timeout,
            ),
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            interval: config.interval,
            phase,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Observe phase transitions.
    pub fn phase(&self) -> watch::Receiver<CyclePhase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: CyclePhase) {
        self.phase.send_replace(phase);
    }

    /// Run one full cycle. The phase is left at `Broadcasting`.
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();

        self.enter(CyclePhase::Discovering);
        let discovered = self.discovery.discover().await;

        self.enter(CyclePhase::CollectingInstances);
        let mut tasks = JoinSet::new();
        for instance in &discovered {
            let mut record = match self.registry.get_instance(&instance.name).await {
                Some(existing) => existing,
                None => instance.to_record(),
            };
            instance.refresh(&mut record);

            let collector = self.instances.clone();
            let registry = self.registry.clone();
            tasks.spawn(async move {
                let record = collector.collect(record).await;
                let status = record.status;
                registry.upsert(record).await;
                status
            });
        }

        let (mut healthy, mut errored) = (0, 0);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(InstanceStatus::Healthy) => healthy += 1,
                Ok(InstanceStatus::Error) => errored += 1,
                Ok(_) => {}
                Err(e) => error!(error = %e, "instance poll task failed"),
            }
        }

        self.enter(CyclePhase::CollectingScheduler);
        let previous = self.registry.scheduler().await;
        let scheduler = self.scheduler.collect(&previous).await;
        self.registry.set_scheduler(scheduler).await;

        self.enter(CyclePhase::Broadcasting);
        let published = self.broadcaster.publish().await;

        let report = CycleReport {
            discovered: discovered.len(),
            healthy,
            errored,
            published,
            elapsed: started.elapsed(),
        };
        info!(
            discovered = report.discovered,
            healthy = report.healthy,
            errored = report.errored,
            delivered = report.published.delivered,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "collection cycle finished"
        );
        report
    }

    /// Run cycles until `shutdown` flips, then close all subscriber queues.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs_f64(), "collection loop started");

        while !*shutdown.borrow() {
            self.run_cycle().await;

            self.enter(CyclePhase::Sleeping);
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => self.enter(CyclePhase::Idle),
                _ = shutdown.changed() => break,
            }
            // Idle is observable between cycles.
            tokio::task::yield_now().await;
        }

        self.registry.subscribers().clear().await;
        self.enter(CyclePhase::Stopped);
        info!("collection loop stopped");
    }
}
