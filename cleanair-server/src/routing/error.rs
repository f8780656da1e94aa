//! Routing error types.

use crate::cache::FetchFailure;
use crate::context::Interrupted;
use crate::domain::InvalidCoordinate;
use crate::resilience::ResilienceError;

/// Errors from the routing provider.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutingError {
    /// A point is malformed or could not be snapped to the road network.
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("no route found: {0}")]
    NoRouteFound(String),

    #[error("routing provider rate limit exceeded")]
    RateLimited,

    #[error("routing provider unavailable: {0}")]
    Unavailable(String),

    #[error("failed to decode routing response: {0}")]
    Decode(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl RoutingError {
    /// Whether the same request could succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RoutingError::Unavailable(_) | RoutingError::RateLimited)
    }
}

impl From<ResilienceError> for RoutingError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::Cancelled => RoutingError::Cancelled,
            ResilienceError::DeadlineExceeded => RoutingError::DeadlineExceeded,
            err if err.is_rate_limited() => RoutingError::RateLimited,
            err => RoutingError::Unavailable(err.to_string()),
        }
    }
}

impl From<Interrupted> for RoutingError {
    fn from(err: Interrupted) -> Self {
        match err {
            Interrupted::Cancelled => RoutingError::Cancelled,
            Interrupted::DeadlineExceeded => RoutingError::DeadlineExceeded,
        }
    }
}

impl From<InvalidCoordinate> for RoutingError {
    fn from(err: InvalidCoordinate) -> Self {
        RoutingError::InvalidCoordinates(err.to_string())
    }
}

impl FetchFailure for RoutingError {
    /// Only outages fall back to a cached route.
    fn serves_stale(&self) -> bool {
        self.is_retryable() || matches!(self, RoutingError::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::Failure;

    #[test]
    fn retryable_kinds() {
        assert!(RoutingError::RateLimited.is_retryable());
        assert!(RoutingError::Unavailable("down".into()).is_retryable());
        assert!(!RoutingError::InvalidCoordinates("x".into()).is_retryable());
        assert!(!RoutingError::NoRouteFound("x".into()).is_retryable());
        assert!(!RoutingError::Cancelled.is_retryable());
    }

    #[test]
    fn exhausted_rate_limit_maps_to_rate_limited() {
        let err = RoutingError::from(ResilienceError::RetriesExhausted {
            dependency: "openrouteservice".into(),
            attempts: 4,
            last_failure: Failure::Status(429),
        });
        assert_eq!(err, RoutingError::RateLimited);

        let err = RoutingError::from(ResilienceError::CircuitOpen {
            dependency: "openrouteservice".into(),
        });
        assert!(matches!(err, RoutingError::Unavailable(_)));
    }

    #[test]
    fn domain_errors_never_serve_stale() {
        assert!(!RoutingError::NoRouteFound("x".into()).serves_stale());
        assert!(!RoutingError::DeadlineExceeded.serves_stale());
        assert!(RoutingError::RateLimited.serves_stale());
    }
}
