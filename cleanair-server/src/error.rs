//! Errors shared by the air-quality and pollen providers.

use crate::cache::FetchFailure;
use crate::context::Interrupted;
use crate::resilience::ResilienceError;

/// Errors from a data provider, after transport details are stripped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Circuit open, retries exhausted, or nothing usable in the cache.
    #[error("{provider} unavailable: {reason}")]
    Unavailable { provider: String, reason: String },

    /// The provider refused the request (4xx).
    #[error("{provider} rejected request: {message}")]
    Rejected { provider: String, message: String },

    /// The response body did not parse.
    #[error("failed to decode {provider} response: {message}")]
    Decode { provider: String, message: String },

    /// The provider answered but had nothing for this query.
    #[error("{provider} returned no data")]
    NoData { provider: String },

    /// Switched off by feature flag.
    #[error("{0} is disabled")]
    Disabled(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ProviderError {
    pub fn from_resilience(provider: &str, err: ResilienceError) -> Self {
        match err {
            ResilienceError::Cancelled => ProviderError::Cancelled,
            ResilienceError::DeadlineExceeded => ProviderError::DeadlineExceeded,
            other => ProviderError::Unavailable {
                provider: provider.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ProviderError::Unavailable { .. })
    }
}

impl From<Interrupted> for ProviderError {
    fn from(err: Interrupted) -> Self {
        match err {
            Interrupted::Cancelled => ProviderError::Cancelled,
            Interrupted::DeadlineExceeded => ProviderError::DeadlineExceeded,
        }
    }
}

impl FetchFailure for ProviderError {
    fn serves_stale(&self) -> bool {
        !matches!(
            self,
            ProviderError::Cancelled | ProviderError::DeadlineExceeded | ProviderError::Disabled(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::Failure;

    #[test]
    fn resilience_errors_map_to_unavailable() {
        let err = ProviderError::from_resilience(
            "luchtmeetnet",
            ResilienceError::RetriesExhausted {
                dependency: "luchtmeetnet".into(),
                attempts: 4,
                last_failure: Failure::Status(502),
            },
        );
        assert!(err.is_unavailable());
        assert!(err.serves_stale());
        assert!(err.to_string().contains("status 502"));
    }

    #[test]
    fn interruptions_never_serve_stale() {
        let err = ProviderError::from_resilience("pollen", ResilienceError::Cancelled);
        assert_eq!(err, ProviderError::Cancelled);
        assert!(!err.serves_stale());
        assert!(!ProviderError::from(Interrupted::DeadlineExceeded).serves_stale());
        assert!(!ProviderError::Disabled("pollen".into()).serves_stale());
    }
}
