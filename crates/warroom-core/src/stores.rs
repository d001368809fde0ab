use serde::{Deserialize, Serialize};

/// A competitor storefront registered by the dashboard. Read-only to the
/// pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedStore {
    pub id: i64,
    pub name: String,
    /// Canonical base URL, e.g. `"https://drinkcann.com"`.
    pub base_url: String,
    pub is_active: bool,
}

/// Normalizes a user-entered store URL: trims whitespace and trailing
/// slashes and defaults the scheme to `https://`.
///
/// `"drinkcann.com/"` becomes `"https://drinkcann.com"`.
#[must_use]
pub fn canonical_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_https_scheme_when_missing() {
        assert_eq!(canonical_base_url("drinkcann.com"), "https://drinkcann.com");
    }

    #[test]
    fn strips_whitespace_and_trailing_slashes() {
        assert_eq!(
            canonical_base_url("  https://drinkcann.com//  "),
            "https://drinkcann.com"
        );
    }

    #[test]
    fn keeps_explicit_http_scheme() {
        assert_eq!(
            canonical_base_url("http://localhost:8080/"),
            "http://localhost:8080"
        );
    }

    #[test]
    fn scheme_detection_is_case_insensitive() {
        assert_eq!(canonical_base_url("HTTPS://Shop.Example"), "HTTPS://Shop.Example");
    }
}
