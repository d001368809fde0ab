//! In-memory [`PipelineRepository`] for tests and dry runs.
//!
//! Mirrors the Postgres semantics the scheduler relies on: atomic appends,
//! latest-per-product with the higher row id winning timestamp ties, and one
//! analysis per store and cycle.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;
use warroom_core::{
    CycleContext, CycleSummary, MarketAnalysis, ProductObservation, Snapshot, StoreReport,
    TrackedStore,
};

use crate::cycle_runs::TriggerSource;
use crate::repository::PipelineRepository;
use crate::DbError;

/// Snapshot of one audited cycle held by [`MemoryRepository`].
#[derive(Debug, Clone)]
pub struct MemoryCycleRun {
    pub id: i64,
    pub cycle_id: Uuid,
    pub trigger: TriggerSource,
    pub status: &'static str,
    pub summary: Option<CycleSummary>,
    pub reports: Vec<StoreReport>,
    pub error_message: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    stores: Vec<TrackedStore>,
    /// `(row id, observation)` in insertion order.
    observations: Vec<(i64, ProductObservation)>,
    analyses: Vec<MarketAnalysis>,
    cycle_runs: Vec<MemoryCycleRun>,
    failing_appends: HashSet<i64>,
    next_row_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_row_id += 1;
        self.next_row_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_stores(stores: Vec<TrackedStore>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                stores,
                ..MemoryState::default()
            }),
        }
    }

    /// Makes every later append for `store_id` fail without writing anything.
    pub async fn fail_appends_for(&self, store_id: i64) {
        self.state.lock().await.failing_appends.insert(store_id);
    }

    /// All observations ever appended, in insertion order.
    pub async fn observations(&self) -> Vec<ProductObservation> {
        let state = self.state.lock().await;
        state.observations.iter().map(|(_, o)| o.clone()).collect()
    }

    pub async fn analyses(&self) -> Vec<MarketAnalysis> {
        self.state.lock().await.analyses.clone()
    }

    pub async fn cycle_runs(&self) -> Vec<MemoryCycleRun> {
        self.state.lock().await.cycle_runs.clone()
    }
}

fn run_mut(state: &mut MemoryState, id: i64) -> Result<&mut MemoryCycleRun, DbError> {
    state
        .cycle_runs
        .iter_mut()
        .find(|run| run.id == id)
        .ok_or(DbError::NotFound)
}

fn running_mut(state: &mut MemoryState, id: i64) -> Result<&mut MemoryCycleRun, DbError> {
    let run = run_mut(state, id)?;
    if run.status != "running" {
        return Err(DbError::InvalidCycleRunTransition {
            id,
            expected_status: "running",
        });
    }
    Ok(run)
}

#[async_trait]
impl PipelineRepository for MemoryRepository {
    async fn active_stores(&self) -> Result<Vec<TrackedStore>, DbError> {
        let state = self.state.lock().await;
        let mut stores: Vec<TrackedStore> =
            state.stores.iter().filter(|s| s.is_active).cloned().collect();
        stores.sort_by_key(|s| s.id);
        Ok(stores)
    }

    async fn latest_snapshot(&self, store_id: i64) -> Result<Snapshot, DbError> {
        let state = self.state.lock().await;
        let mut latest: std::collections::BTreeMap<String, (i64, ProductObservation)> =
            std::collections::BTreeMap::new();

        for (row_id, obs) in state.observations.iter().filter(|(_, o)| o.store_id == store_id) {
            let newer = latest.get(&obs.product_id).is_none_or(|(best_id, best)| {
                (obs.observed_at, *row_id) > (best.observed_at, *best_id)
            });
            if newer {
                latest.insert(obs.product_id.clone(), (*row_id, obs.clone()));
            }
        }

        Ok(latest.into_iter().map(|(id, (_, obs))| (id, obs)).collect())
    }

    async fn append_observations(
        &self,
        observations: &[ProductObservation],
    ) -> Result<u64, DbError> {
        let mut state = self.state.lock().await;
        if observations
            .iter()
            .any(|o| state.failing_appends.contains(&o.store_id))
        {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(
                "append rejected by in-memory repository".to_owned(),
            )));
        }

        for obs in observations {
            let id = state.next_id();
            state.observations.push((id, obs.clone()));
        }
        Ok(u64::try_from(observations.len()).unwrap_or(u64::MAX))
    }

    async fn insert_analysis(&self, analysis: &MarketAnalysis) -> Result<i64, DbError> {
        let mut state = self.state.lock().await;
        if state
            .analyses
            .iter()
            .any(|a| a.store_id == analysis.store_id && a.cycle_id == analysis.cycle_id)
        {
            return Err(DbError::Sqlx(sqlx::Error::Protocol(format!(
                "duplicate analysis for store {} in cycle {}",
                analysis.store_id, analysis.cycle_id
            ))));
        }
        state.analyses.push(analysis.clone());
        Ok(state.next_id())
    }

    async fn begin_cycle(
        &self,
        cycle: &CycleContext,
        trigger: TriggerSource,
    ) -> Result<i64, DbError> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.cycle_runs.push(MemoryCycleRun {
            id,
            cycle_id: cycle.cycle_id,
            trigger,
            status: "running",
            summary: None,
            reports: Vec::new(),
            error_message: None,
        });
        Ok(id)
    }

    async fn record_store_outcome(
        &self,
        cycle_run_id: i64,
        report: &StoreReport,
    ) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let run = run_mut(&mut state, cycle_run_id)?;
        run.reports.retain(|r| r.store_id != report.store_id);
        run.reports.push(report.clone());
        Ok(())
    }

    async fn finish_cycle(
        &self,
        cycle_run_id: i64,
        summary: &CycleSummary,
    ) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let run = running_mut(&mut state, cycle_run_id)?;
        run.status = "succeeded";
        run.summary = Some(summary.clone());
        Ok(())
    }

    async fn fail_cycle(&self, cycle_run_id: i64, error_message: &str) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        let run = running_mut(&mut state, cycle_run_id)?;
        run.status = "failed";
        run.error_message = Some(error_message.to_owned());
        Ok(())
    }
}
