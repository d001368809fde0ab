//! Response shapes for the public Shopify `products.json` endpoint.
//!
//! Only the fields the price pipeline reads are modelled; everything else in
//! the payload is ignored by serde.
//!
//! ### `id`
//! Numeric on every observed store, but some proxies and headless front ends
//! serialize it as a string. Both are accepted.
//!
//! ### `price`
//! A decimal string (`"30.00"`) on stock Shopify. Custom storefronts have been
//! seen emitting bare JSON numbers or short strings like `"12"` / `"12.5"`.

use serde::Deserialize;

/// Top-level response from `GET /products.json`.
#[derive(Debug, Deserialize)]
pub struct ShopifyProductsResponse {
    pub products: Vec<ShopifyProduct>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyProduct {
    pub id: ShopifyId,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub handle: Option<String>,

    /// Missing and empty are both treated as "no variants".
    #[serde(default)]
    pub variants: Vec<ShopifyVariant>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyVariant {
    #[serde(default)]
    pub id: Option<ShopifyId>,

    /// `None` when the field is absent or `null`.
    #[serde(default)]
    pub price: Option<PriceValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ShopifyId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for ShopifyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShopifyId::Number(n) => write!(f, "{n}"),
            ShopifyId::Text(s) => f.write_str(s.trim()),
        }
    }
}

/// A variant price as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PriceValue {
    Text(String),
    Number(serde_json::Number),
}
