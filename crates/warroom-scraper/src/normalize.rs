//! Normalization from raw Shopify types to [`warroom_core::CatalogItem`].
//!
//! A catalog is accepted whole or not at all: one product with an unusable
//! price fails the entire fetch, so the change detector never diffs against
//! a partial list.

use std::collections::HashSet;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use warroom_core::CatalogItem;

use crate::error::FetchError;
use crate::types::{PriceValue, ShopifyProduct};

/// Parses a wire price into a non-negative, two-decimal fixed-point amount.
///
/// # Errors
///
/// Returns a human-readable reason when the value is empty, not a number,
/// or negative.
pub fn parse_price(value: &PriceValue) -> Result<Decimal, String> {
    let raw = match value {
        PriceValue::Text(s) => s.trim().to_owned(),
        PriceValue::Number(n) => n.to_string(),
    };
    if raw.is_empty() {
        return Err("empty price".to_owned());
    }

    let amount = Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| format!("unparseable price \"{raw}\""))?;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(format!("negative price \"{raw}\""));
    }

    let mut amount = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    amount.rescale(2);
    Ok(amount)
}

/// Normalizes one product, using the cheapest variant as its price.
///
/// # Errors
///
/// Returns [`FetchError::MalformedBody`] if the product has no variants or
/// any variant price is missing or invalid.
pub fn normalize_product(
    product: ShopifyProduct,
    currency_code: &str,
) -> Result<CatalogItem, FetchError> {
    let product_id = product.id.to_string();
    let malformed = |reason: String| FetchError::MalformedBody {
        context: format!("product {product_id}"),
        reason,
    };

    if product_id.is_empty() {
        return Err(malformed("empty product id".to_owned()));
    }
    if product.variants.is_empty() {
        return Err(malformed("product has no variants".to_owned()));
    }

    let mut min_price: Option<Decimal> = None;
    for variant in &product.variants {
        let price = variant
            .price
            .as_ref()
            .ok_or_else(|| malformed("variant has no price".to_owned()))
            .and_then(|value| parse_price(value).map_err(&malformed))?;
        min_price = Some(min_price.map_or(price, |current| current.min(price)));
    }
    let price = min_price.ok_or_else(|| malformed("product has no variants".to_owned()))?;

    let handle = product
        .handle
        .map(|h| h.trim().to_owned())
        .filter(|h| !h.is_empty());

    // Fall back to the handle, then the id, so every change line has a label.
    let title = product
        .title
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .or_else(|| handle.clone())
        .unwrap_or_else(|| product_id.clone());

    Ok(CatalogItem {
        product_id,
        handle,
        title,
        price,
        currency_code: currency_code.to_owned(),
    })
}

/// Normalizes a full multi-page product list.
///
/// Products repeated across overlapping pages keep their first occurrence.
///
/// # Errors
///
/// Propagates the first [`FetchError::MalformedBody`] from
/// [`normalize_product`].
pub fn normalize_catalog(
    products: Vec<ShopifyProduct>,
    currency_code: &str,
) -> Result<Vec<CatalogItem>, FetchError> {
    let mut seen: HashSet<String> = HashSet::with_capacity(products.len());
    let mut items = Vec::with_capacity(products.len());

    for product in products {
        let item = normalize_product(product, currency_code)?;
        if seen.insert(item.product_id.clone()) {
            items.push(item);
        } else {
            tracing::debug!(product_id = %item.product_id, "skipping duplicate product");
        }
    }

    Ok(items)
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
