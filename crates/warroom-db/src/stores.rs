//! Read access to `tracked_stores`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use warroom_core::TrackedStore;

use crate::DbError;

/// A row from the `tracked_stores` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreRow {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoreRow> for TrackedStore {
    fn from(row: StoreRow) -> Self {
        TrackedStore {
            id: row.id,
            name: row.name,
            base_url: row.base_url,
            is_active: row.is_active,
        }
    }
}

/// Lists all active stores, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_stores(pool: &PgPool) -> Result<Vec<StoreRow>, DbError> {
    let rows = sqlx::query_as::<_, StoreRow>(
        "SELECT id, name, base_url, is_active, created_at, updated_at \
         FROM tracked_stores \
         WHERE is_active = true \
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a store by id, active or not.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row matches, or [`DbError::Sqlx`] on
/// query failure.
pub async fn get_store(pool: &PgPool, id: i64) -> Result<StoreRow, DbError> {
    sqlx::query_as::<_, StoreRow>(
        "SELECT id, name, base_url, is_active, created_at, updated_at \
         FROM tracked_stores WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
