//! Multi-page catalog fetch for `ShopifyClient`.

use async_trait::async_trait;
use warroom_core::CatalogItem;

use crate::error::FetchError;
use crate::normalize::normalize_catalog;
use crate::pagination::next_page_cursor;
use crate::types::ShopifyProduct;

use super::{CatalogSource, ShopifyClient};

impl ShopifyClient {
    /// Fetches every product page of a store by following `Link` cursors.
    ///
    /// **All-or-nothing**: if any page fails, products from earlier pages are
    /// discarded and the error is returned. A partial product list would read
    /// as a wave of removals when diffed against the previous snapshot.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::fetch_products_page`]. Returns
    /// [`FetchError::PaginationLimit`] once more than `max_pages` pages
    /// would be requested.
    pub async fn fetch_all_products(
        &self,
        base_url: &str,
    ) -> Result<Vec<ShopifyProduct>, FetchError> {
        let max_pages = self.settings.max_pages;
        let mut all_products: Vec<ShopifyProduct> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            page_count += 1;
            if page_count > max_pages {
                return Err(FetchError::PaginationLimit {
                    base_url: base_url.to_owned(),
                    max_pages,
                });
            }

            let (response, link_header) =
                self.fetch_products_page(base_url, cursor.as_deref()).await?;
            all_products.extend(response.products);

            cursor = next_page_cursor(link_header.as_deref());
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!(
            base_url,
            pages = page_count,
            products = all_products.len(),
            "catalog pages fetched"
        );
        Ok(all_products)
    }
}

#[async_trait]
impl CatalogSource for ShopifyClient {
    async fn fetch_catalog(&self, base_url: &str) -> Result<Vec<CatalogItem>, FetchError> {
        let products = self.fetch_all_products(base_url).await?;
        normalize_catalog(products, &self.settings.currency_code)
    }
}
