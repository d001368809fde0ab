//! Append-only price history in `product_observations`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use warroom_core::{ProductObservation, Snapshot};

use crate::DbError;

/// A row from the `product_observations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ObservationRow {
    pub id: i64,
    pub store_id: i64,
    pub cycle_id: Uuid,
    pub product_id: String,
    pub title: String,
    pub price: Decimal,
    pub currency_code: String,
    pub observed_at: DateTime<Utc>,
}

impl From<ObservationRow> for ProductObservation {
    fn from(row: ObservationRow) -> Self {
        ProductObservation {
            store_id: row.store_id,
            cycle_id: row.cycle_id,
            product_id: row.product_id,
            title: row.title,
            price: row.price,
            currency_code: row.currency_code,
            observed_at: row.observed_at,
        }
    }
}

/// Inserts all `observations` in one transaction.
///
/// Either every row is written or none is. Not idempotent: calling twice
/// writes the rows twice.
///
/// Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; the transaction is rolled
/// back on drop.
pub async fn append_observations(
    pool: &PgPool,
    observations: &[ProductObservation],
) -> Result<u64, DbError> {
    if observations.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for obs in observations {
        let result = sqlx::query(
            "INSERT INTO product_observations \
                 (store_id, cycle_id, product_id, title, price, currency_code, observed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(obs.store_id)
        .bind(obs.cycle_id)
        .bind(&obs.product_id)
        .bind(&obs.title)
        .bind(obs.price)
        .bind(&obs.currency_code)
        .bind(obs.observed_at)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Returns the most recent observation of every product ever seen for the
/// store, keyed by product id.
///
/// Ties on `observed_at` go to the later-inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_snapshot(pool: &PgPool, store_id: i64) -> Result<Snapshot, DbError> {
    let rows = sqlx::query_as::<_, ObservationRow>(
        "SELECT DISTINCT ON (product_id) \
                id, store_id, cycle_id, product_id, title, price, currency_code, observed_at \
         FROM product_observations \
         WHERE store_id = $1 \
         ORDER BY product_id, observed_at DESC, id DESC",
    )
    .bind(store_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.product_id.clone(), ProductObservation::from(row)))
        .collect())
}

/// Price history of one product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_price_history(
    pool: &PgPool,
    store_id: i64,
    product_id: &str,
    limit: i64,
) -> Result<Vec<ObservationRow>, DbError> {
    let rows = sqlx::query_as::<_, ObservationRow>(
        "SELECT id, store_id, cycle_id, product_id, title, price, currency_code, observed_at \
         FROM product_observations \
         WHERE store_id = $1 AND product_id = $2 \
         ORDER BY observed_at DESC, id DESC \
         LIMIT $3",
    )
    .bind(store_id)
    .bind(product_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
