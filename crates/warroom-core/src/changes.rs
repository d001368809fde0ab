//! Change detection between the stored snapshot and a fresh catalog fetch.
//!
//! The output order is the significance ordering the synthesizer truncates
//! on, so it is part of the contract:
//!
//! 1. `Increased` / `Decreased`, by absolute percent delta, largest first.
//! 2. `New` and `Removed`, in encounter order.
//! 3. `Unchanged`, in encounter order.
//!
//! Encounter order is the snapshot's product-ID order followed by products
//! that only appear in the fetch, in fetch order.

use std::collections::{HashMap, HashSet};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::products::{CatalogItem, ProductObservation, Snapshot};

/// Stand-in percent delta for a price rising from zero.
pub const PERCENT_DELTA_CAP: Decimal = Decimal::from_parts(999_999, 0, 0, false, 0);

const MIN_PERCENT_DELTA: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    New,
    Increased,
    Decreased,
    Removed,
    Unchanged,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::New => "NEW",
            ChangeKind::Increased => "INCREASED",
            ChangeKind::Decreased => "DECREASED",
            ChangeKind::Removed => "REMOVED",
            ChangeKind::Unchanged => "UNCHANGED",
        }
    }

    /// `true` for `Increased` and `Decreased`.
    #[must_use]
    pub fn is_price_change(self) -> bool {
        matches!(self, ChangeKind::Increased | ChangeKind::Decreased)
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one product between two cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub product_id: String,
    pub title: String,
    pub kind: ChangeKind,
    /// `None` for `New`.
    pub previous_price: Option<Decimal>,
    /// `None` for `Removed`.
    pub current_price: Option<Decimal>,
    pub currency_code: String,
    /// `(current - previous) / previous * 100`; `None` for `New` and `Removed`.
    pub percent_delta: Option<Decimal>,
}

impl ChangeRecord {
    fn appeared(item: &CatalogItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            title: item.title.clone(),
            kind: ChangeKind::New,
            previous_price: None,
            current_price: Some(item.price),
            currency_code: item.currency_code.clone(),
            percent_delta: None,
        }
    }

    fn removed(previous: &ProductObservation) -> Self {
        Self {
            product_id: previous.product_id.clone(),
            title: previous.title.clone(),
            kind: ChangeKind::Removed,
            previous_price: Some(previous.price),
            current_price: None,
            currency_code: previous.currency_code.clone(),
            percent_delta: None,
        }
    }

    fn compared(previous: &ProductObservation, item: &CatalogItem) -> Self {
        let kind = match item.price.cmp(&previous.price) {
            std::cmp::Ordering::Greater => ChangeKind::Increased,
            std::cmp::Ordering::Less => ChangeKind::Decreased,
            std::cmp::Ordering::Equal => ChangeKind::Unchanged,
        };
        Self {
            product_id: item.product_id.clone(),
            title: item.title.clone(),
            kind,
            previous_price: Some(previous.price),
            current_price: Some(item.price),
            currency_code: item.currency_code.clone(),
            percent_delta: Some(percent_delta(previous.price, item.price)),
        }
    }

    /// Absolute percent delta used for significance ordering; zero when absent.
    #[must_use]
    pub fn magnitude(&self) -> Decimal {
        self.percent_delta.map_or(Decimal::ZERO, |d| d.abs())
    }
}

/// Percent change from `previous` to `current`, rounded half away from zero
/// to two decimal places.
///
/// A nonzero move that rounds to zero is reported as `±0.01` so the sign
/// always follows the direction of the change.
///
/// A zero `previous` price never divides: a rise from zero yields
/// [`PERCENT_DELTA_CAP`], zero to zero yields zero. Results are capped to
/// `±PERCENT_DELTA_CAP`.
#[must_use]
pub fn percent_delta(previous: Decimal, current: Decimal) -> Decimal {
    if previous.is_zero() {
        return if current.is_zero() {
            Decimal::ZERO
        } else {
            PERCENT_DELTA_CAP
        };
    }

    let diff = current - previous;
    let delta = diff
        .checked_div(previous)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(if diff.is_sign_negative() {
            -PERCENT_DELTA_CAP
        } else {
            PERCENT_DELTA_CAP
        })
        .clamp(-PERCENT_DELTA_CAP, PERCENT_DELTA_CAP)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    if delta.is_zero() && !diff.is_zero() {
        // Any real move keeps its direction.
        if diff.is_sign_negative() {
            -MIN_PERCENT_DELTA
        } else {
            MIN_PERCENT_DELTA
        }
    } else {
        delta
    }
}

/// Classifies every product in the union of `previous` and `current`.
///
/// Emits exactly one record per distinct product ID. If `current` repeats an
/// ID, the first occurrence wins. Prices are compared by amount only.
#[must_use]
pub fn detect_changes(previous: &Snapshot, current: &[CatalogItem]) -> Vec<ChangeRecord> {
    let mut current_by_id: HashMap<&str, &CatalogItem> = HashMap::with_capacity(current.len());
    for item in current {
        current_by_id.entry(item.product_id.as_str()).or_insert(item);
    }

    let mut price_changes = Vec::new();
    let mut appeared_or_removed = Vec::new();
    let mut unchanged = Vec::new();

    for (product_id, observation) in previous {
        match current_by_id.get(product_id.as_str()) {
            Some(item) => {
                let record = ChangeRecord::compared(observation, item);
                if record.kind.is_price_change() {
                    price_changes.push(record);
                } else {
                    unchanged.push(record);
                }
            }
            None => appeared_or_removed.push(ChangeRecord::removed(observation)),
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for item in current {
        let id = item.product_id.as_str();
        if previous.contains_key(id) || !seen.insert(id) {
            continue;
        }
        appeared_or_removed.push(ChangeRecord::appeared(item));
    }

    // Stable sort keeps encounter order among equal magnitudes.
    price_changes.sort_by(|a, b| b.magnitude().cmp(&a.magnitude()));

    price_changes.extend(appeared_or_removed);
    price_changes.extend(unchanged);
    price_changes
}

#[cfg(test)]
#[path = "changes_test.rs"]
mod tests;
