//! The persistence seam the scheduler depends on.

use async_trait::async_trait;
use sqlx::PgPool;
use warroom_core::{
    CycleContext, CycleSummary, MarketAnalysis, ProductObservation, Snapshot, StoreReport,
    TrackedStore,
};

use crate::cycle_runs::TriggerSource;
use crate::DbError;

/// Everything a scheduler cycle reads and writes.
///
/// Implemented by [`PgRepository`] for production and by
/// [`crate::MemoryRepository`] for tests and dry runs.
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    async fn active_stores(&self) -> Result<Vec<TrackedStore>, DbError>;

    /// Latest observation per product for the store.
    async fn latest_snapshot(&self, store_id: i64) -> Result<Snapshot, DbError>;

    /// Writes all observations atomically. Returns the number of rows written.
    async fn append_observations(
        &self,
        observations: &[ProductObservation],
    ) -> Result<u64, DbError>;

    async fn insert_analysis(&self, analysis: &MarketAnalysis) -> Result<i64, DbError>;

    /// Opens an audit row for the cycle and returns its id.
    async fn begin_cycle(
        &self,
        cycle: &CycleContext,
        trigger: TriggerSource,
    ) -> Result<i64, DbError>;

    async fn record_store_outcome(
        &self,
        cycle_run_id: i64,
        report: &StoreReport,
    ) -> Result<(), DbError>;

    async fn finish_cycle(&self, cycle_run_id: i64, summary: &CycleSummary)
        -> Result<(), DbError>;

    async fn fail_cycle(&self, cycle_run_id: i64, error_message: &str) -> Result<(), DbError>;
}

/// Postgres-backed [`PipelineRepository`].
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PipelineRepository for PgRepository {
    async fn active_stores(&self) -> Result<Vec<TrackedStore>, DbError> {
        let rows = crate::stores::list_active_stores(&self.pool).await?;
        Ok(rows.into_iter().map(TrackedStore::from).collect())
    }

    async fn latest_snapshot(&self, store_id: i64) -> Result<Snapshot, DbError> {
        crate::observations::latest_snapshot(&self.pool, store_id).await
    }

    async fn append_observations(
        &self,
        observations: &[ProductObservation],
    ) -> Result<u64, DbError> {
        crate::observations::append_observations(&self.pool, observations).await
    }

    async fn insert_analysis(&self, analysis: &MarketAnalysis) -> Result<i64, DbError> {
        crate::analyses::insert_market_analysis(&self.pool, analysis).await
    }

    async fn begin_cycle(
        &self,
        cycle: &CycleContext,
        trigger: TriggerSource,
    ) -> Result<i64, DbError> {
        let row = crate::cycle_runs::create_cycle_run(&self.pool, cycle, trigger).await?;
        Ok(row.id)
    }

    async fn record_store_outcome(
        &self,
        cycle_run_id: i64,
        report: &StoreReport,
    ) -> Result<(), DbError> {
        crate::cycle_runs::record_cycle_run_store(&self.pool, cycle_run_id, report).await
    }

    async fn finish_cycle(
        &self,
        cycle_run_id: i64,
        summary: &CycleSummary,
    ) -> Result<(), DbError> {
        crate::cycle_runs::complete_cycle_run(&self.pool, cycle_run_id, summary).await
    }

    async fn fail_cycle(&self, cycle_run_id: i64, error_message: &str) -> Result<(), DbError> {
        crate::cycle_runs::fail_cycle_run(&self.pool, cycle_run_id, error_message).await
    }
}
