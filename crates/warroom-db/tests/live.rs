//! Live integration tests for warroom-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/warroom-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.
//!
//! Ignored by default; run with `DATABASE_URL` set and `--ignored`.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use warroom_core::{
    Bet, CycleContext, CycleStage, CycleSummary, MarketAnalysis, MarketBias, Percentage,
    ProductObservation, StoreReport,
};
use warroom_db::{
    append_observations, complete_cycle_run, create_cycle_run, fail_cycle_run, get_cycle_run,
    get_store, insert_market_analysis, latest_analysis_per_store, latest_snapshot,
    list_active_stores, list_cycle_run_stores, list_market_analyses, list_price_history,
    record_cycle_run_store, DbError, PgRepository, PipelineRepository, TriggerSource,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Insert a tracked store row and return its generated `id`.
async fn insert_test_store(pool: &sqlx::PgPool, name: &str, is_active: bool) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO tracked_stores (name, base_url, is_active) \
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(format!("https://{name}.test"))
    .bind(is_active)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_test_store failed for '{name}': {e}"))
}

fn observation(
    store_id: i64,
    cycle_id: Uuid,
    product_id: &str,
    cents: i64,
    observed_at: chrono::DateTime<Utc>,
) -> ProductObservation {
    ProductObservation {
        store_id,
        cycle_id,
        product_id: product_id.to_string(),
        title: format!("Product {product_id}"),
        price: Decimal::new(cents, 2),
        currency_code: "USD".to_string(),
        observed_at,
    }
}

fn analysis(store_id: i64, cycle: &CycleContext) -> MarketAnalysis {
    MarketAnalysis {
        store_id,
        cycle_id: cycle.cycle_id,
        generated_at: cycle.started_at,
        bias: MarketBias::Defensive,
        sentiment_score: Percentage::from(35),
        sentiment_reasoning: Some("competitor discounting".to_string()),
        alpha_opportunity: "Hoodie - undercut by 10% [reprice]".to_string(),
        bets: vec![Bet {
            action: "Hold prices".to_string(),
            probability: Percentage::from(70),
            timeframe: None,
            reasoning: None,
        }],
        price_gap_analysis: None,
        risk_assessment: Some("low".to_string()),
        raw_response: "{}".to_string(),
        degraded: false,
        model: "test-model".to_string(),
        changes_considered: 2,
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn list_active_stores_skips_inactive(pool: sqlx::PgPool) {
    let active = insert_test_store(&pool, "alpha", true).await;
    let _inactive = insert_test_store(&pool, "beta", false).await;

    let stores = list_active_stores(&pool).await.expect("list failed");
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].id, active);

    let missing = get_store(&pool, 9_999).await.unwrap_err();
    assert!(matches!(missing, DbError::NotFound));
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn latest_snapshot_returns_newest_per_product(pool: sqlx::PgPool) {
    let store_id = insert_test_store(&pool, "gamma", true).await;
    let t0 = Utc::now() - Duration::hours(2);
    let t1 = t0 + Duration::hours(1);
    let c0 = Uuid::new_v4();
    let c1 = Uuid::new_v4();

    append_observations(
        &pool,
        &[
            observation(store_id, c0, "A", 1000, t0),
            observation(store_id, c0, "B", 2000, t0),
        ],
    )
    .await
    .expect("first append failed");
    append_observations(&pool, &[observation(store_id, c1, "A", 1200, t1)])
        .await
        .expect("second append failed");

    let snapshot = latest_snapshot(&pool, store_id).await.expect("latest failed");
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot["A"].price, Decimal::new(1200, 2));
    assert_eq!(snapshot["A"].cycle_id, c1);
    assert_eq!(snapshot["B"].price, Decimal::new(2000, 2));

    let again = latest_snapshot(&pool, store_id).await.expect("latest failed");
    assert_eq!(snapshot, again);

    let history = list_price_history(&pool, store_id, "A", 10)
        .await
        .expect("history failed");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].price, Decimal::new(1200, 2));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn same_timestamp_tie_goes_to_later_insert(pool: sqlx::PgPool) {
    let store_id = insert_test_store(&pool, "delta", true).await;
    let at = Utc::now();

    append_observations(&pool, &[observation(store_id, Uuid::new_v4(), "A", 500, at)])
        .await
        .unwrap();
    append_observations(&pool, &[observation(store_id, Uuid::new_v4(), "A", 700, at)])
        .await
        .unwrap();

    let snapshot = latest_snapshot(&pool, store_id).await.unwrap();
    assert_eq!(snapshot["A"].price, Decimal::new(700, 2));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn failed_append_rolls_back_whole_batch(pool: sqlx::PgPool) {
    let store_id = insert_test_store(&pool, "epsilon", true).await;
    let cycle = Uuid::new_v4();
    let now = Utc::now();

    // Second row references a store that does not exist.
    let result = append_observations(
        &pool,
        &[
            observation(store_id, cycle, "A", 100, now),
            observation(store_id + 1_000, cycle, "B", 100, now),
        ],
    )
    .await;
    assert!(result.is_err());

    let snapshot = latest_snapshot(&pool, store_id).await.unwrap();
    assert!(snapshot.is_empty(), "partial batch must not be visible");
}

// ---------------------------------------------------------------------------
// Analyses
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn analyses_are_append_only_and_listed_newest_first(pool: sqlx::PgPool) {
    let store_id = insert_test_store(&pool, "zeta", true).await;
    let first = CycleContext::new(Utc::now() - Duration::hours(1));
    let second = CycleContext::new(Utc::now());

    insert_market_analysis(&pool, &analysis(store_id, &first))
        .await
        .unwrap();
    insert_market_analysis(&pool, &analysis(store_id, &second))
        .await
        .unwrap();

    // One analysis per (store, cycle).
    assert!(insert_market_analysis(&pool, &analysis(store_id, &second))
        .await
        .is_err());

    let rows = list_market_analyses(&pool, Some(store_id), 10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].cycle_id, second.cycle_id);

    let decoded = rows[0].clone().into_analysis().unwrap();
    assert_eq!(decoded.bias, MarketBias::Defensive);
    assert_eq!(decoded.bets[0].probability.get(), 70);

    let latest = latest_analysis_per_store(&pool).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].cycle_id, second.cycle_id);
}

// ---------------------------------------------------------------------------
// Cycle runs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn cycle_run_lifecycle_running_to_succeeded(pool: sqlx::PgPool) {
    let store_id = insert_test_store(&pool, "eta", true).await;
    let cycle = CycleContext::new(Utc::now());

    let run = create_cycle_run(&pool, &cycle, TriggerSource::Scheduler)
        .await
        .unwrap();
    assert_eq!(run.status, "running");
    assert_eq!(run.trigger_source, "scheduler");

    let report = StoreReport::skipped(store_id, "eta", CycleStage::Fetching, "timed out");
    record_cycle_run_store(&pool, run.id, &report).await.unwrap();
    complete_cycle_run(&pool, run.id, &CycleSummary::from_reports(&[report]))
        .await
        .unwrap();

    let finished = get_cycle_run(&pool, run.id).await.unwrap();
    assert_eq!(finished.status, "succeeded");
    assert_eq!(finished.stores_skipped, 1);
    assert!(finished.completed_at.is_some());

    let stores = list_cycle_run_stores(&pool, run.id).await.unwrap();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].outcome, "skipped");
    assert_eq!(stores[0].failed_stage.as_deref(), Some("fetching"));

    let err = fail_cycle_run(&pool, run.id, "too late").await.unwrap_err();
    assert!(matches!(err, DbError::InvalidCycleRunTransition { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn pg_repository_matches_free_functions(pool: sqlx::PgPool) {
    let store_id = insert_test_store(&pool, "theta", true).await;
    let repo = PgRepository::new(pool.clone());

    let stores = repo.active_stores().await.unwrap();
    assert_eq!(stores.len(), 1);

    let cycle = CycleContext::new(Utc::now());
    let written = repo
        .append_observations(&[observation(store_id, cycle.cycle_id, "A", 100, cycle.started_at)])
        .await
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(repo.latest_snapshot(store_id).await.unwrap().len(), 1);

    let run_id = repo
        .begin_cycle(&cycle, TriggerSource::Manual)
        .await
        .unwrap();
    repo.fail_cycle(run_id, "store listing failed").await.unwrap();
    let run = get_cycle_run(&pool, run_id).await.unwrap();
    assert_eq!(run.status, "failed");
    assert_eq!(run.error_message.as_deref(), Some("store listing failed"));
}
