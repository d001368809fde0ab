//! Database operations for `cycle_runs` and `cycle_run_stores`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use warroom_core::{CycleContext, CycleStage, CycleSummary, StoreReport};

use crate::DbError;

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// The periodic loop.
    Scheduler,
    /// A one-off `once` invocation.
    Manual,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Scheduler => "scheduler",
            TriggerSource::Manual => "manual",
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `cycle_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CycleRunRow {
    pub id: i64,
    pub cycle_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stores_persisted: i32,
    pub stores_skipped: i32,
    pub stores_degraded: i32,
    pub error_message: Option<String>,
}

/// A row from the `cycle_run_stores` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CycleRunStoreRow {
    pub id: i64,
    pub cycle_run_id: i64,
    pub store_id: i64,
    pub outcome: String,
    pub failed_stage: Option<String>,
    pub change_count: i32,
    pub degraded: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

const RUN_COLUMNS: &str = "id, cycle_id, trigger_source, status, started_at, completed_at, \
     stores_persisted, stores_skipped, stores_degraded, error_message";

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// cycle_runs operations
// ---------------------------------------------------------------------------

/// Creates a cycle run in `running` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_cycle_run(
    pool: &PgPool,
    cycle: &CycleContext,
    trigger: TriggerSource,
) -> Result<CycleRunRow, DbError> {
    let sql = format!(
        "INSERT INTO cycle_runs (cycle_id, trigger_source, status, started_at) \
         VALUES ($1, $2, 'running', $3) \
         RETURNING {RUN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, CycleRunRow>(&sql)
        .bind(cycle.cycle_id)
        .bind(trigger.as_str())
        .bind(cycle.started_at)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Marks a run as `succeeded` and records its store totals.
///
/// # Errors
///
/// Returns [`DbError::InvalidCycleRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_cycle_run(
    pool: &PgPool,
    id: i64,
    summary: &CycleSummary,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE cycle_runs \
         SET status = 'succeeded', completed_at = NOW(), \
             stores_persisted = $1, stores_skipped = $2, stores_degraded = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(count(summary.persisted))
    .bind(count(summary.skipped))
    .bind(count(summary.degraded))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCycleRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidCycleRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_cycle_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE cycle_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCycleRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has this id.
pub async fn get_cycle_run(pool: &PgPool, id: i64) -> Result<CycleRunRow, DbError> {
    let sql = format!("SELECT {RUN_COLUMNS} FROM cycle_runs WHERE id = $1");
    sqlx::query_as::<_, CycleRunRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// cycle_run_stores operations
// ---------------------------------------------------------------------------

/// Records one store's outcome within a run. A repeated call for the same
/// store overwrites the earlier outcome.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn record_cycle_run_store(
    pool: &PgPool,
    cycle_run_id: i64,
    report: &StoreReport,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO cycle_run_stores \
             (cycle_run_id, store_id, outcome, failed_stage, change_count, degraded, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (cycle_run_id, store_id) DO UPDATE SET \
             outcome = EXCLUDED.outcome, \
             failed_stage = EXCLUDED.failed_stage, \
             change_count = EXCLUDED.change_count, \
             degraded = EXCLUDED.degraded, \
             error_message = EXCLUDED.error_message",
    )
    .bind(cycle_run_id)
    .bind(report.store_id)
    .bind(report.stage.as_str())
    .bind(report.failed_stage.map(CycleStage::as_str))
    .bind(count(report.change_count))
    .bind(report.degraded)
    .bind(&report.error)
    .execute(pool)
    .await?;

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_cycle_run_stores(
    pool: &PgPool,
    cycle_run_id: i64,
) -> Result<Vec<CycleRunStoreRow>, DbError> {
    let rows = sqlx::query_as::<_, CycleRunStoreRow>(
        "SELECT id, cycle_run_id, store_id, outcome, failed_stage, change_count, degraded, \
                error_message, created_at \
         FROM cycle_run_stores \
         WHERE cycle_run_id = $1 \
         ORDER BY store_id",
    )
    .bind(cycle_run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
