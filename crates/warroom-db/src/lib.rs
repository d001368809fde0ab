//! Postgres persistence for tracked stores, price observations, market
//! analyses and the cycle audit trail.

pub mod analyses;
pub mod cycle_runs;
pub mod memory;
pub mod observations;
pub mod repository;
pub mod stores;

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use warroom_core::AppConfig;

pub use analyses::{
    insert_market_analysis, latest_analysis_per_store, list_market_analyses, MarketAnalysisRow,
};
pub use cycle_runs::{
    complete_cycle_run, create_cycle_run, fail_cycle_run, get_cycle_run, list_cycle_run_stores,
    record_cycle_run_store, CycleRunRow, CycleRunStoreRow, TriggerSource,
};
pub use memory::MemoryRepository;
pub use observations::{
    append_observations, latest_snapshot, list_price_history, ObservationRow,
};
pub use repository::{PgRepository, PipelineRepository};
pub use stores::{get_store, list_active_stores, StoreRow};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Resolved from this crate's manifest directory.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Sizing for the worker's connection pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("cycle run {id} is not in the expected '{expected_status}' status")]
    InvalidCycleRunTransition {
        id: i64,
        expected_status: &'static str,
    },
    #[error("stored {context} could not be decoded: {reason}")]
    Decode {
        context: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Opens the worker pool against `database_url`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if no connection can be established within the
/// acquire timeout.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Brings the schema up to date and returns how many migrations were new.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // Empty on a fresh database, before the bookkeeping table exists.
    let already_applied: Vec<i64> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(pool)
            .await
            .unwrap_or_default();

    MIGRATOR.run(pool).await?;

    Ok(MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .filter(|m| !already_applied.contains(&m.version))
        .count())
}

/// Round-trips a trivial query so startup fails fast on a dead database.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_is_small_and_bounded() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.min_connections <= config.max_connections);
        assert_eq!(config.acquire_timeout_secs, DEFAULT_ACQUIRE_TIMEOUT_SECS);
    }

    #[test]
    fn migrations_are_embedded() {
        assert!(MIGRATOR.iter().count() >= 4);
    }
}
