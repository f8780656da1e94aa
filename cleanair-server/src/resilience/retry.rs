//! Retry policy and failure classification.

use std::fmt;
use std::time::Duration;

use super::transport::TransportError;

/// Exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_interval: Duration,

    /// Upper bound on any single delay.
    pub max_interval: Duration,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Relative jitter; 0.2 spreads each delay over ±20%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(200),
            max_interval: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval = initial;
        self.max_interval = max;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let secs = self.initial_interval.as_secs_f64() * factor;
        let capped = secs.min(self.max_interval.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Delay before retry number `retry` (0-based), with jitter applied and
    /// the result kept within `max_interval`.
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry).as_secs_f64();
        let spread = self.jitter.clamp(0.0, 1.0) * (2.0 * fastrand::f64() - 1.0);
        let jittered = (base * (1.0 + spread)).clamp(0.0, self.max_interval.as_secs_f64());
        Duration::from_secs_f64(jittered)
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Connection or protocol error.
    Network(String),

    /// The attempt timed out in the transport.
    Timeout,

    /// The provider answered with an error status.
    Status(u16),
}

impl Failure {
    /// Classify an HTTP status. `None` means the response should be handed
    /// to the caller: success, or a client error that retrying won't fix.
    pub fn from_status(status: u16) -> Option<Self> {
        if status == 429 || (500..600).contains(&status) {
            Some(Failure::Status(status))
        } else {
            None
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Failure::Status(429))
    }
}

impl From<TransportError> for Failure {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Failure::Timeout,
            other => Failure::Network(other.to_string()),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Network(message) => write!(f, "network error: {message}"),
            Failure::Timeout => write!(f, "timed out"),
            Failure::Status(429) => write!(f, "rate limited"),
            Failure::Status(status) => write!(f, "server error (status {status})"),
        }
    }
}
