use warroom_core::{
    detect_changes, CycleContext, CycleStage, ProductObservation, StoreReport, TrackedStore,
};

use super::Pipeline;

/// Runs one store through fetch → snapshot → append → diff → synthesize →
/// persist and reports where it ended up.
///
/// Never fails: any error marks the store skipped at the stage in progress.
pub async fn process_store(
    pipeline: &Pipeline,
    store: &TrackedStore,
    cycle: &CycleContext,
) -> StoreReport {
    let skip = |stage: CycleStage, error: String| {
        tracing::warn!(store = %store.name, stage = %stage, error = %error, "store skipped");
        StoreReport::skipped(store.id, &store.name, stage, error)
    };

    tracing::debug!(store = %store.name, stage = %CycleStage::Fetching, "store cycle started");
    let items = match pipeline.catalog.fetch_catalog(&store.base_url).await {
        Ok(items) if items.is_empty() => {
            return skip(CycleStage::Fetching, "catalog returned no products".to_owned());
        }
        Ok(items) => items,
        Err(e) => return skip(CycleStage::Fetching, e.to_string()),
    };

    let previous = match pipeline.repo.latest_snapshot(store.id).await {
        Ok(snapshot) => snapshot,
        Err(e) => return skip(CycleStage::Diffing, e.to_string()),
    };

    let observations: Vec<ProductObservation> = items
        .iter()
        .map(|item| {
            ProductObservation::from_catalog_item(store.id, cycle.cycle_id, item, cycle.started_at)
        })
        .collect();
    if let Err(e) = pipeline.repo.append_observations(&observations).await {
        return skip(CycleStage::Diffing, e.to_string());
    }

    let changes = detect_changes(&previous, &items);
    tracing::debug!(
        store = %store.name,
        products = items.len(),
        changes = changes.iter().filter(|c| c.kind.is_price_change()).count(),
        "diff complete"
    );

    let analysis = match pipeline.synthesizer.synthesize(store, &changes, cycle).await {
        Ok(analysis) => analysis,
        Err(e) => return skip(CycleStage::Synthesizing, e.to_string()),
    };
    if let Err(e) = pipeline.repo.insert_analysis(&analysis).await {
        return skip(CycleStage::Synthesizing, e.to_string());
    }

    tracing::info!(
        store = %store.name,
        changes = changes.len(),
        bias = %analysis.bias,
        score = analysis.sentiment_score.get(),
        degraded = analysis.degraded,
        "store persisted"
    );
    StoreReport::persisted(store.id, &store.name, changes.len(), analysis.degraded)
}
