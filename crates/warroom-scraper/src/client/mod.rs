//! HTTP client for Shopify's public `products.json` endpoint.

mod fetch_all;
mod origin;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use warroom_core::{AppConfig, CatalogItem};

use crate::error::FetchError;
use crate::retry::retry_with_backoff;
use crate::types::ShopifyProductsResponse;

pub use origin::store_origin;

/// Connect timeout ceiling; the overall request timeout still applies.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Source of a store's current catalog.
///
/// The scheduler depends on this trait rather than on [`ShopifyClient`] so
/// that cycles can be driven by fakes in tests.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetches and normalizes the full catalog of the store at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`]; a failure never yields a partial list.
    async fn fetch_catalog(&self, base_url: &str) -> Result<Vec<CatalogItem>, FetchError>;
}

/// Tunables for [`ShopifyClient`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Per-page cap on the response body.
    pub max_body_bytes: usize,
    pub page_size: u32,
    pub max_pages: usize,
    /// Additional attempts after the first failure for transient errors.
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    /// Currency assigned to every item; `products.json` does not carry one.
    pub currency_code: String,
}

impl FetchSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.fetch_timeout_secs,
            user_agent: config.fetch_user_agent.clone(),
            max_body_bytes: config.fetch_max_body_bytes,
            page_size: config.fetch_page_size,
            max_pages: config.fetch_max_pages,
            max_retries: config.fetch_max_retries,
            backoff_base_secs: config.fetch_retry_backoff_base_secs,
            currency_code: config.default_currency.clone(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: "warroom/0.1 (price-intelligence)".to_owned(),
            max_body_bytes: 8 * 1024 * 1024,
            page_size: 250,
            max_pages: 20,
            max_retries: 2,
            backoff_base_secs: 2,
            currency_code: "USD".to_owned(),
        }
    }
}

/// HTTP client for Shopify's public `products.json` endpoint.
///
/// Maps 429 to [`FetchError::RateLimited`], other non-2xx responses to
/// [`FetchError::HttpStatus`] and transport failures to `Timeout` or
/// `Unreachable`. Transient errors are retried with exponential backoff.
pub struct ShopifyClient {
    pub(super) client: Client,
    pub(super) settings: FetchSettings,
}

impl ShopifyClient {
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(
                settings.timeout_secs.min(CONNECT_TIMEOUT_SECS),
            ))
            .user_agent(&settings.user_agent)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self { client, settings })
    }

    #[must_use]
    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Fetches one page of products, retrying transient failures.
    ///
    /// Returns the parsed page and the raw `Link` header, if any.
    ///
    /// # Errors
    ///
    /// - [`FetchError::RateLimited`]: HTTP 429 after all retries.
    /// - [`FetchError::HttpStatus`]: any other non-2xx status (5xx retried).
    /// - [`FetchError::Timeout`] / [`FetchError::Unreachable`]: transport failure after all retries.
    /// - [`FetchError::BodyTooLarge`]: body exceeded the configured cap (not retried).
    /// - [`FetchError::MalformedBody`]: body is not a products payload (not retried).
    pub async fn fetch_products_page(
        &self,
        base_url: &str,
        page_info: Option<&str>,
    ) -> Result<(ShopifyProductsResponse, Option<String>), FetchError> {
        let url = Self::products_url(base_url, self.settings.page_size, page_info)?;
        let domain = origin::domain_of(&url);

        retry_with_backoff(
            self.settings.max_retries,
            self.settings.backoff_base_secs,
            || {
                let url = url.clone();
                let domain = domain.clone();
                async move {
                    let response = self
                        .client
                        .get(url.clone())
                        .header(reqwest::header::ACCEPT, "application/json")
                        .header(reqwest::header::CACHE_CONTROL, "no-cache")
                        .send()
                        .await
                        .map_err(|e| FetchError::from_transport(url.as_str(), &e))?;
                    let status = response.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after_secs = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.trim().parse::<u64>().ok());
                        return Err(FetchError::RateLimited {
                            domain,
                            retry_after_secs,
                        });
                    }

                    if !status.is_success() {
                        return Err(FetchError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }

                    // Read the Link header before the body consumes the response.
                    let link_header = response
                        .headers()
                        .get(reqwest::header::LINK)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_owned);

                    let body =
                        read_bounded_body(response, url.as_str(), self.settings.max_body_bytes)
                            .await?;
                    let parsed = serde_json::from_slice::<ShopifyProductsResponse>(&body)
                        .map_err(|e| FetchError::MalformedBody {
                            context: format!("products page from {domain}"),
                            reason: e.to_string(),
                        })?;

                    Ok((parsed, link_header))
                }
            },
        )
        .await
    }

    /// Builds the `products.json` URL for the given store, page size, and
    /// optional cursor.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidStoreUrl`] if no origin can be derived.
    pub(crate) fn products_url(
        base_url: &str,
        limit: u32,
        page_info: Option<&str>,
    ) -> Result<Url, FetchError> {
        let mut url = store_origin(base_url)?;
        url.set_path("/products.json");
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        if let Some(cursor) = page_info {
            url.query_pairs_mut().append_pair("page_info", cursor);
        }
        Ok(url)
    }
}

/// Streams the response body, aborting as soon as it crosses `limit` bytes.
async fn read_bounded_body(
    mut response: Response,
    url: &str,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let too_large = || FetchError::BodyTooLarge {
        url: url.to_owned(),
        limit_bytes: limit,
    };

    if response
        .content_length()
        .is_some_and(|len| len > u64::try_from(limit).unwrap_or(u64::MAX))
    {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::from_transport(url, &e))?
    {
        if body.len().saturating_add(chunk.len()) > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
