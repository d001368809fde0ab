//! The periodic ingestion-diff-synthesis loop.
//!
//! A [`Driver`] owns its collaborators and a cancellation token. Each cycle
//! lists the active stores and fans them out over a bounded pool; a store's
//! failure only ever marks that store skipped.

mod store_cycle;


use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use warroom_analyst::Synthesizer;
use warroom_core::{AppConfig, CycleContext, CycleSummary, StoreReport};
use warroom_db::{DbError, PipelineRepository, TriggerSource};
use warroom_scraper::CatalogSource;

use store_cycle::process_store;

#[derive(Debug, Clone, Copy)]
pub struct DriverSettings {
    pub cycle_interval: Duration,
    /// Stores processed at once; 1 means strictly sequential.
    pub max_concurrent_stores: usize,
    /// Minimum gap between the starts of two stores in a cycle, whatever
    /// the concurrency.
    pub inter_store_delay: Duration,
}

impl DriverSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cycle_interval: Duration::from_secs(config.cycle_interval_secs),
            max_concurrent_stores: config.max_concurrent_stores.max(1),
            inter_store_delay: Duration::from_millis(config.inter_store_delay_ms),
        }
    }
}

/// Collaborators one store cycle needs.
pub struct Pipeline {
    pub repo: Arc<dyn PipelineRepository>,
    pub catalog: Arc<dyn CatalogSource>,
    pub synthesizer: Arc<Synthesizer>,
}

pub struct Driver {
    pipeline: Pipeline,
    settings: DriverSettings,
    shutdown: CancellationToken,
}

impl Driver {
    #[must_use]
    pub fn new(pipeline: Pipeline, settings: DriverSettings, shutdown: CancellationToken) -> Self {
        Self {
            pipeline,
            settings,
            shutdown,
        }
    }

    /// Runs cycles until the token is cancelled or `max_cycles` cycles have
    /// completed. Returns the number of cycles run.
    ///
    /// Cancellation is only observed between cycles; an in-flight cycle
    /// always finishes.
    pub async fn run(&self, max_cycles: Option<u64>) -> u64 {
        let mut completed = 0u64;

        loop {
            if self.shutdown.is_cancelled() {
                tracing::info!(completed, "shutdown requested, stopping scheduler");
                break;
            }

            if let Err(e) = self
                .run_cycle(Utc::now(), TriggerSource::Scheduler, None)
                .await
            {
                tracing::error!(error = %e, "cycle aborted: could not list stores");
            }
            completed += 1;

            if max_cycles.is_some_and(|max| completed >= max) {
                tracing::info!(completed, "cycle limit reached, stopping scheduler");
                break;
            }

            tokio::select! {
                () = self.shutdown.cancelled() => {
                    tracing::info!(completed, "shutdown requested, stopping scheduler");
                    break;
                }
                () = tokio::time::sleep(self.settings.cycle_interval) => {}
            }
        }

        completed
    }

    /// Runs one cycle over the active stores, or only `store_filter` when set.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] only when the active store list cannot be read.
    /// Every per-store failure is reported in the summary instead.
    pub async fn run_cycle(
        &self,
        now: DateTime<Utc>,
        trigger: TriggerSource,
        store_filter: Option<i64>,
    ) -> Result<CycleSummary, DbError> {
        let cycle = CycleContext::new(now);
        let repo = &self.pipeline.repo;

        let run_id = match repo.begin_cycle(&cycle, trigger).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(cycle_id = %cycle.cycle_id, error = %e, "failed to open cycle audit row");
                None
            }
        };

        let stores = match repo.active_stores().await {
            Ok(stores) => stores,
            Err(e) => {
                if let Some(id) = run_id {
                    if let Err(audit) = repo.fail_cycle(id, &e.to_string()).await {
                        tracing::warn!(cycle_run_id = id, error = %audit, "failed to mark cycle failed");
                    }
                }
                return Err(e);
            }
        };
        let stores: Vec<_> = match store_filter {
            Some(id) => stores.into_iter().filter(|s| s.id == id).collect(),
            None => stores,
        };
        if let Some(id) = store_filter.filter(|_| stores.is_empty()) {
            tracing::warn!(store_id = id, "requested store is not active");
        }

        tracing::info!(
            cycle_id = %cycle.cycle_id,
            stores = stores.len(),
            trigger = trigger.as_str(),
            "cycle started"
        );

        let delay = self.settings.inter_store_delay;
        let next_start: Mutex<Option<Instant>> = Mutex::new(None);
        let reports: Vec<StoreReport> = stream::iter(stores.iter())
            .map(|store| {
                let cycle = &cycle;
                let next_start = &next_start;
                async move {
                    if !delay.is_zero() {
                        // Held while waiting so concurrent stores queue up
                        // and start one delay apart.
                        let mut next = next_start.lock().await;
                        if let Some(at) = *next {
                            tokio::time::sleep_until(at).await;
                        }
                        *next = Some(Instant::now() + delay);
                    }
                    let report = process_store(&self.pipeline, store, cycle).await;
                    if let Some(id) = run_id {
                        if let Err(e) = repo.record_store_outcome(id, &report).await {
                            tracing::warn!(store = %store.name, error = %e, "failed to record store outcome");
                        }
                    }
                    report
                }
            })
            .buffer_unordered(self.settings.max_concurrent_stores.max(1))
            .collect()
            .await;

        let summary = CycleSummary::from_reports(&reports);
        if let Some(id) = run_id {
            if let Err(e) = repo.finish_cycle(id, &summary).await {
                tracing::warn!(cycle_run_id = id, error = %e, "failed to close cycle audit row");
            }
        }

        tracing::info!(
            cycle_id = %cycle.cycle_id,
            persisted = summary.persisted,
            skipped = summary.skipped,
            degraded = summary.degraded,
            "cycle complete"
        );
        Ok(summary)
    }
}
