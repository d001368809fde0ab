//! Read-only `report` command: latest analyses per store.

use std::collections::HashMap;

use warroom_db::MarketAnalysisRow;

/// Prints stored analyses, newest first.
///
/// With `store_id` the last `limit` analyses of that store are shown,
/// otherwise the latest analysis of every store.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub(crate) async fn run_report(
    pool: &sqlx::PgPool,
    store_id: Option<i64>,
    limit: i64,
) -> anyhow::Result<()> {
    let rows = match store_id {
        Some(id) => {
            warroom_db::get_store(pool, id)
                .await
                .map_err(|e| anyhow::anyhow!("store {id}: {e}"))?;
            warroom_db::list_market_analyses(pool, Some(id), limit).await?
        }
        None => warroom_db::latest_analysis_per_store(pool).await?,
    };

    if rows.is_empty() {
        println!("no analyses found; run `warroom-worker once` first");
        return Ok(());
    }

    let names: HashMap<i64, String> = warroom_db::list_active_stores(pool)
        .await?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();

    for line in render_rows(&rows, &names) {
        println!("{line}");
    }
    Ok(())
}

fn render_rows(rows: &[MarketAnalysisRow], names: &HashMap<i64, String>) -> Vec<String> {
    let mut lines = Vec::with_capacity(rows.len() * 2 + 1);
    lines.push(format!(
        "{:<24}{:<18}{:<12}{:<7}{:<9}ALPHA",
        "STORE", "GENERATED", "BIAS", "SCORE", "CHANGES"
    ));
    for row in rows {
        let label = names
            .get(&row.store_id)
            .cloned()
            .unwrap_or_else(|| format!("store:{}", row.store_id));
        let bias = if row.degraded {
            format!("{}*", row.market_bias)
        } else {
            row.market_bias.clone()
        };
        lines.push(format!(
            "{:<24}{:<18}{:<12}{:<7}{:<9}{}",
            label,
            row.generated_at.format("%Y-%m-%d %H:%M").to_string(),
            bias,
            row.sentiment_score,
            row.changes_considered,
            row.alpha_opportunity
        ));
        for bet in &row.bets.0 {
            lines.push(format!(
                "    {:>3}%  {}{}",
                bet.probability.get(),
                bet.action,
                bet.timeframe
                    .as_deref()
                    .map(|t| format!(" ({t})"))
                    .unwrap_or_default()
            ));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sqlx::types::Json;
    use warroom_core::{Bet, Percentage};

    fn row(store_id: i64, degraded: bool) -> MarketAnalysisRow {
        MarketAnalysisRow {
            id: 1,
            store_id,
            cycle_id: uuid_zero(),
            generated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 30, 0).unwrap(),
            market_bias: "AGGRESSIVE".to_owned(),
            sentiment_score: 80,
            sentiment_reasoning: None,
            alpha_opportunity: "Tee - hike [undercut]".to_owned(),
            bets: Json(vec![Bet {
                action: "Drop tee price".to_owned(),
                probability: Percentage::from(75),
                timeframe: Some("NOW".to_owned()),
                reasoning: None,
            }]),
            price_gap_analysis: None,
            risk_assessment: None,
            raw_response: "{}".to_owned(),
            degraded,
            model: "m".to_owned(),
            changes_considered: 3,
        }
    }

    fn uuid_zero() -> sqlx::types::Uuid {
        sqlx::types::Uuid::nil()
    }

    #[test]
    fn rows_render_with_store_names_and_bets() {
        let names = HashMap::from([(1, "Rival".to_owned())]);
        let lines = render_rows(&[row(1, false)], &names);

        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Rival"));
        assert!(lines[1].contains("2026-03-01 12:30"));
        assert!(lines[1].contains("Tee - hike [undercut]"));
        assert_eq!(lines[2], "     75%  Drop tee price (NOW)");
    }

    #[test]
    fn unknown_store_and_degraded_rows_are_marked() {
        let lines = render_rows(&[row(9, true)], &HashMap::new());
        assert!(lines[1].starts_with("store:9"));
        assert!(lines[1].contains("AGGRESSIVE*"));
    }
}
