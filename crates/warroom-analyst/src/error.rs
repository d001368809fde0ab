use thiserror::Error;

/// Failure talking to the inference service.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference service unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("inference request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("rate limited by inference service")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("inference service returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("invalid completion response: {reason}")]
    InvalidResponse { reason: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl InferenceError {
    /// `true` for network failures, timeouts, 429 and 5xx responses.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            InferenceError::Unreachable { .. }
            | InferenceError::Timeout { .. }
            | InferenceError::RateLimited { .. } => true,
            InferenceError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn from_transport(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            InferenceError::Timeout { timeout_secs }
        } else {
            InferenceError::Unreachable {
                reason: err.to_string(),
            }
        }
    }
}

/// A model reply that cannot be turned into a market analysis.
///
/// Handled inside the synthesizer by one stricter retry and then the
/// degraded fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(InferenceError::Timeout { timeout_secs: 5 }.is_transient());
        assert!(InferenceError::RateLimited {
            retry_after_secs: None
        }
        .is_transient());
        assert!(InferenceError::HttpStatus {
            status: 502,
            body: String::new()
        }
        .is_transient());
        assert!(!InferenceError::HttpStatus {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!InferenceError::InvalidResponse {
            reason: "no choices".into()
        }
        .is_transient());
    }

    #[test]
    fn schema_error_messages_name_the_field() {
        assert_eq!(
            SchemaError::MissingField("sentiment_score").to_string(),
            "missing required field `sentiment_score`"
        );
    }
}
