//! Scrape orchestration: fan-out to the worker pool, deadline-bounded fan-in.
//!
//! One orchestration round serves one inbound request. Tasks are spawned for
//! every discovered (target, instance) pair and queue behind a process-wide
//! semaphore; the collection loop then waits for each task with a shrinking
//! slice of the single shared budget. Whatever is complete when the budget
//! runs out makes it into the response, everything else is abandoned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::auth::AuthenticationEnricher;
use crate::config::Target;
use crate::discovery::InstanceDiscovery;
use crate::enrich::LabelEnricher;
use crate::fetcher::{MetricsFetcher, ScrapeError, ScrapeOutcome};
use crate::merge;
use crate::model::{Instance, MetricFamilyMapping};

/// Counters describing how one aggregation round went.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScrapeSummary {
    pub tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// Result of one orchestration round.
pub struct AggregatedScrape {
    pub families: MetricFamilyMapping,
    pub summary: ScrapeSummary,
}

pub struct ScrapeOrchestrator {
    client: Client,
    auth: Arc<AuthenticationEnricher>,
    discovery: Arc<dyn InstanceDiscovery>,
    pool: Arc<Semaphore>,
    targets: Vec<Target>,
    max_processing_time: Duration,
}

struct PendingScrape {
    access_url: String,
    instance_id: String,
    handle: JoinHandle<ScrapeOutcome>,
}

impl ScrapeOrchestrator {
    pub fn new(
        client: Client,
        auth: Arc<AuthenticationEnricher>,
        discovery: Arc<dyn InstanceDiscovery>,
        pool: Arc<Semaphore>,
        targets: Vec<Target>,
        max_processing_time: Duration,
    ) -> Self {
        Self {
            client,
            auth,
            discovery,
            pool,
            targets,
            max_processing_time,
        }
    }

    /// One fetcher per discovered (target, instance) pair. A target whose
    /// route or instance list cannot be resolved is skipped; the rest of the
    /// request proceeds.
    fn create_metric_fetchers(&self) -> Vec<MetricsFetcher> {
        let mut fetchers = Vec::new();

        for target in &self.targets {
            let org = &target.org_name;
            let space = &target.space_name;
            let app = &target.application_name;

            let Some(base_url) = self.discovery.resolve_base_url(org, space, app) else {
                warn!(
                    "Unable to resolve a hostname for {}/{}/{}; skipping",
                    org, space, app
                );
                continue;
            };
            let Some(instances) = self.discovery.list_instance_ids(org, space, app) else {
                warn!(
                    "Unable to list instances for {}/{}/{}; skipping",
                    org, space, app
                );
                continue;
            };

            let access_url = format!("{}{}", base_url, target.path());
            debug!(
                "Seeing {} instances for {}/{}/{} at {}",
                instances.len(),
                org,
                space,
                app,
                access_url
            );

            for instance_id in instances {
                let instance = Instance {
                    target: target.clone(),
                    instance_id,
                };
                fetchers.push(self.fetcher_for(&access_url, instance));
            }
        }

        fetchers
    }

    /// Binds one discovered instance to a scrape task carrying its
    /// enrichment tuple.
    fn fetcher_for(&self, access_url: &str, instance: Instance) -> MetricsFetcher {
        let Instance {
            target,
            instance_id,
        } = instance;
        let enricher = LabelEnricher::new(
            &target.org_name,
            &target.space_name,
            &target.application_name,
            &instance_id,
        );
        MetricsFetcher::new(
            access_url.to_string(),
            instance_id,
            Arc::clone(&self.auth),
            enricher,
        )
    }

    /// Runs one aggregation round: dispatch everything, then collect results
    /// in submission order under the shared deadline and fold them into the
    /// request-owned accumulator.
    pub async fn aggregate(&self) -> AggregatedScrape {
        let fetchers = self.create_metric_fetchers();
        let mut summary = ScrapeSummary {
            tasks: fetchers.len(),
            ..ScrapeSummary::default()
        };

        let mut pending: Vec<PendingScrape> = Vec::with_capacity(fetchers.len());
        for fetcher in fetchers {
            let access_url = fetcher.access_url().to_string();
            let instance_id = fetcher.instance_id().to_string();
            let client = self.client.clone();
            let pool = Arc::clone(&self.pool);
            let handle = tokio::spawn(async move {
                // Queue behind the pool; the permit is held until the scrape
                // finishes, which also bounds abandoned tasks still running
                // from earlier requests.
                let _permit = pool
                    .acquire_owned()
                    .await
                    .expect("scrape pool semaphore closed");
                fetcher.fetch(&client).await
            });
            pending.push(PendingScrape {
                access_url,
                instance_id,
                handle,
            });
        }

        let start = Instant::now();
        let deadline = start + self.max_processing_time;
        let mut aggregated = MetricFamilyMapping::default();

        for PendingScrape {
            access_url,
            instance_id,
            mut handle,
        } in pending
        {
            // Shrinking per-iteration slice of the shared budget, clamped at
            // zero. A zero wait still polls the handle once, so tasks that
            // finished before the deadline expired are collected either way.
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, &mut handle).await {
                Ok(Ok(Ok(families))) => {
                    merge::merge(&mut aggregated, families);
                    summary.succeeded += 1;
                }
                Ok(Ok(Err(err))) => {
                    match &err {
                        // Expected under load, so not a warning.
                        ScrapeError::Timeout { .. } => info!(
                            "Timeout while fetching metrics from {} instance {}",
                            access_url, instance_id
                        ),
                        _ => warn!(
                            "Failed to fetch metrics from {} instance {}: {}",
                            access_url, instance_id, err
                        ),
                    }
                    summary.failed += 1;
                }
                Ok(Err(join_err)) => {
                    warn!(
                        "Scrape task for {} instance {} did not complete: {}",
                        access_url, instance_id, join_err
                    );
                    summary.failed += 1;
                }
                Err(_) => {
                    // Budget exhausted. The task keeps running detached; its
                    // eventual result belongs to no request and is discarded.
                    info!(
                        "Deadline expired before {} instance {} completed; abandoning scrape",
                        access_url, instance_id
                    );
                    summary.abandoned += 1;
                }
            }
        }

        debug!(
            "Aggregation round finished: {}/{} scrapes merged ({} failed, {} abandoned) in {:?}",
            summary.succeeded,
            summary.tasks,
            summary.failed,
            summary.abandoned,
            start.elapsed()
        );

        AggregatedScrape {
            families: aggregated,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoDiscovery;

    impl InstanceDiscovery for NoDiscovery {
        fn resolve_base_url(&self, _: &str, _: &str, _: &str) -> Option<String> {
            None
        }

        fn list_instance_ids(&self, _: &str, _: &str, _: &str) -> Option<Vec<String>> {
            None
        }
    }

    fn target() -> Target {
        Target {
            org_name: "org".into(),
            space_name: "space".into(),
            application_name: "app".into(),
            path: None,
        }
    }

    #[tokio::test]
    async fn unresolvable_targets_are_skipped_not_fatal() {
        let orchestrator = ScrapeOrchestrator::new(
            Client::new(),
            Arc::new(AuthenticationEnricher::None),
            Arc::new(NoDiscovery),
            Arc::new(Semaphore::new(4)),
            vec![target(), target()],
            Duration::from_millis(500),
        );

        let result = orchestrator.aggregate().await;
        assert!(result.families.is_empty());
        assert_eq!(result.summary.tasks, 0);
        assert_eq!(result.summary.succeeded, 0);
    }

    #[tokio::test]
    async fn no_targets_is_an_empty_round() {
        let orchestrator = ScrapeOrchestrator::new(
            Client::new(),
            Arc::new(AuthenticationEnricher::None),
            Arc::new(NoDiscovery),
            Arc::new(Semaphore::new(4)),
            Vec::new(),
            Duration::from_millis(500),
        );

        let result = orchestrator.aggregate().await;
        assert!(result.families.is_empty());
        assert_eq!(result.summary.tasks, 0);
    }
}
