use crate::context::Interrupted;

use super::retry::Failure;

/// Why the resilience client gave up on a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResilienceError {
    #[error("{dependency} unavailable: circuit open")]
    CircuitOpen { dependency: String },

    #[error("{dependency} unavailable after {attempts} attempts: {last_failure}")]
    RetriesExhausted {
        dependency: String,
        attempts: u32,
        last_failure: Failure,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl ResilienceError {
    /// True for the "provider unavailable" family.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ResilienceError::CircuitOpen { .. } | ResilienceError::RetriesExhausted { .. }
        )
    }

    /// True when retries ran out on rate-limit responses.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            ResilienceError::RetriesExhausted { last_failure, .. } if last_failure.is_rate_limited()
        )
    }
}

impl From<Interrupted> for ResilienceError {
    fn from(err: Interrupted) -> Self {
        match err {
            Interrupted::Cancelled => ResilienceError::Cancelled,
            Interrupted::DeadlineExceeded => ResilienceError::DeadlineExceeded,
        }
    }
}
