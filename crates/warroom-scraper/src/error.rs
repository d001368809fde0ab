use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("store unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("rate limited by {domain}")]
    RateLimited {
        domain: String,
        retry_after_secs: Option<u64>,
    },

    #[error("malformed catalog body ({context}): {reason}")]
    MalformedBody { context: String, reason: String },

    #[error("response from {url} exceeded {limit_bytes} bytes")]
    BodyTooLarge { url: String, limit_bytes: usize },

    #[error("invalid store URL \"{base_url}\": {reason}")]
    InvalidStoreUrl { base_url: String, reason: String },

    #[error("pagination limit reached for {base_url}: exceeded {max_pages} pages")]
    PaginationLimit { base_url: String, max_pages: usize },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl FetchError {
    /// `true` for conditions that may clear up on their own: network
    /// failures, timeouts, 429 and 5xx responses.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Unreachable { .. }
            | FetchError::Timeout { .. }
            | FetchError::RateLimited { .. } => true,
            FetchError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Maps a transport-level `reqwest` failure onto `Timeout` or `Unreachable`.
    pub(crate) fn from_transport(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_owned(),
            }
        } else {
            FetchError::Unreachable {
                url: url.to_owned(),
                reason: err.to_string(),
            }
        }
    }
}
