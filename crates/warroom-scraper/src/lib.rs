pub mod client;
pub mod error;
pub mod normalize;
pub mod pagination;
mod retry;
pub mod types;

pub use client::{store_origin, CatalogSource, FetchSettings, ShopifyClient};
pub use error::FetchError;
pub use normalize::{normalize_catalog, normalize_product, parse_price};
pub use types::{PriceValue, ShopifyId, ShopifyProduct, ShopifyProductsResponse, ShopifyVariant};
