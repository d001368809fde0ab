use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product read from a competitor catalog, flattened to one canonical price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Storefront product ID, stored as a string to avoid precision loss.
    pub product_id: String,
    /// Storefront URL slug, e.g. `"hi-boy-blood-orange-5mg"`.
    pub handle: Option<String>,
    pub title: String,
    /// Fixed-point price with two decimal places. For multi-variant products
    /// this is the cheapest variant.
    pub price: Decimal,
    /// ISO 4217 currency code (e.g., `"USD"`).
    pub currency_code: String,
}

/// One immutable row of the price history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductObservation {
    pub store_id: i64,
    /// Cycle that produced this observation.
    pub cycle_id: Uuid,
    pub product_id: String,
    pub title: String,
    pub price: Decimal,
    pub currency_code: String,
    pub observed_at: DateTime<Utc>,
}

impl ProductObservation {
    /// Builds the observation recorded for `item` during a cycle.
    #[must_use]
    pub fn from_catalog_item(
        store_id: i64,
        cycle_id: Uuid,
        item: &CatalogItem,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            store_id,
            cycle_id,
            product_id: item.product_id.clone(),
            title: item.title.clone(),
            price: item.price,
            currency_code: item.currency_code.clone(),
            observed_at,
        }
    }
}

/// The most recent observation per product for one store, keyed by product ID.
///
/// A `BTreeMap` so that iteration order (and therefore change-record order
/// for removed products) is deterministic.
pub type Snapshot = BTreeMap<String, ProductObservation>;
