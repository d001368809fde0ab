//! Database operations for `market_analyses`.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use warroom_core::{Bet, MarketAnalysis, MarketBias, Percentage};

use crate::DbError;

/// A row from the `market_analyses` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MarketAnalysisRow {
    pub id: i64,
    pub store_id: i64,
    pub cycle_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub market_bias: String,
    pub sentiment_score: i16,
    pub sentiment_reasoning: Option<String>,
    pub alpha_opportunity: String,
    pub bets: Json<Vec<Bet>>,
    pub price_gap_analysis: Option<String>,
    pub risk_assessment: Option<String>,
    pub raw_response: String,
    pub degraded: bool,
    pub model: String,
    pub changes_considered: i32,
}

impl MarketAnalysisRow {
    /// Converts the row back into the domain record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if the stored bias is not one of the three
    /// known labels.
    pub fn into_analysis(self) -> Result<MarketAnalysis, DbError> {
        let bias = match self.market_bias.as_str() {
            "AGGRESSIVE" => MarketBias::Aggressive,
            "DEFENSIVE" => MarketBias::Defensive,
            "NEUTRAL" => MarketBias::Neutral,
            other => {
                return Err(DbError::Decode {
                    context: "market_bias",
                    reason: format!("unknown label \"{other}\""),
                })
            }
        };

        Ok(MarketAnalysis {
            store_id: self.store_id,
            cycle_id: self.cycle_id,
            generated_at: self.generated_at,
            bias,
            sentiment_score: Percentage::from(i64::from(self.sentiment_score)),
            sentiment_reasoning: self.sentiment_reasoning,
            alpha_opportunity: self.alpha_opportunity,
            bets: self.bets.0,
            price_gap_analysis: self.price_gap_analysis,
            risk_assessment: self.risk_assessment,
            raw_response: self.raw_response,
            degraded: self.degraded,
            model: self.model,
            changes_considered: usize::try_from(self.changes_considered).unwrap_or(0),
        })
    }
}

const SELECT_COLUMNS: &str = "id, store_id, cycle_id, generated_at, market_bias, sentiment_score, \
     sentiment_reasoning, alpha_opportunity, bets, price_gap_analysis, risk_assessment, \
     raw_response, degraded, model, changes_considered";

/// Inserts one analysis and returns its row id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails, including a second analysis
/// for the same store and cycle.
pub async fn insert_market_analysis(
    pool: &PgPool,
    analysis: &MarketAnalysis,
) -> Result<i64, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO market_analyses \
             (store_id, cycle_id, generated_at, market_bias, sentiment_score, \
              sentiment_reasoning, alpha_opportunity, bets, price_gap_analysis, \
              risk_assessment, raw_response, degraded, model, changes_considered) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
         RETURNING id",
    )
    .bind(analysis.store_id)
    .bind(analysis.cycle_id)
    .bind(analysis.generated_at)
    .bind(analysis.bias.as_str())
    .bind(i16::from(analysis.sentiment_score.get()))
    .bind(&analysis.sentiment_reasoning)
    .bind(&analysis.alpha_opportunity)
    .bind(Json(&analysis.bets))
    .bind(&analysis.price_gap_analysis)
    .bind(&analysis.risk_assessment)
    .bind(&analysis.raw_response)
    .bind(analysis.degraded)
    .bind(&analysis.model)
    .bind(i32::try_from(analysis.changes_considered).unwrap_or(i32::MAX))
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Lists analyses newest first, optionally for one store only.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_market_analyses(
    pool: &PgPool,
    store_id: Option<i64>,
    limit: i64,
) -> Result<Vec<MarketAnalysisRow>, DbError> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM market_analyses \
         WHERE ($1::BIGINT IS NULL OR store_id = $1) \
         ORDER BY generated_at DESC, id DESC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, MarketAnalysisRow>(&sql)
        .bind(store_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// The most recent analysis of every store that has one, ordered by store id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_analysis_per_store(pool: &PgPool) -> Result<Vec<MarketAnalysisRow>, DbError> {
    let sql = format!(
        "SELECT DISTINCT ON (store_id) {SELECT_COLUMNS} FROM market_analyses \
         ORDER BY store_id, generated_at DESC, id DESC"
    );
    let rows = sqlx::query_as::<_, MarketAnalysisRow>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
