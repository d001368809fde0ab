//! Store origin and domain extraction for the Shopify client.

use reqwest::Url;
use warroom_core::canonical_base_url;

use crate::error::FetchError;

/// Resolves a tracked store URL to its scheme+host origin.
///
/// Given `"drinkcann.com/collections/all"`, returns `https://drinkcann.com`,
/// so `products.json` is always fetched from the store root.
///
/// # Errors
///
/// Returns [`FetchError::InvalidStoreUrl`] if the URL does not parse or has
/// no host.
pub fn store_origin(base_url: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidStoreUrl {
        base_url: base_url.to_owned(),
        reason,
    };

    let url = Url::parse(&canonical_base_url(base_url)).map_err(|e| invalid(e.to_string()))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("URL has no host".to_owned()));
    }

    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(invalid("URL has an opaque origin".to_owned()));
    }
    Url::parse(&origin.ascii_serialization()).map_err(|e| invalid(e.to_string()))
}

/// Hostname of `url` for log fields and error messages.
pub(super) fn domain_of(url: &Url) -> String {
    url.host_str()
        .map_or_else(|| url.as_str().to_owned(), str::to_owned)
}
