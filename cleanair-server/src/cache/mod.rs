//! Provider data cache with stale-if-error fallback.
//!
//! One [`ProviderCache`] instance sits in front of each data source. Entries
//! move through three phases:
//!
//! ```text
//! fetched_at ──── fresh ────> expires_at ── stale, usable on error ──> fetched_at + stale_if_error_ttl ── dead
//! ```

mod store;

use std::time::Duration;

use crate::context::Interrupted;

pub use store::{CacheStats, CachedEntry, CachedView, ProviderCache};

/// Default sweep period for dead entries.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Errors a cache fetch may fail with.
///
/// Interruptions of the caller's context must convert into the error type
/// so the cache can surface them.
pub trait FetchFailure: From<Interrupted> {
    /// Whether a usable stale entry may be served in place of this error.
    /// Cancellations and deadline expiry must return false.
    fn serves_stale(&self) -> bool;
}

/// Freshness settings for one cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry is served without asking the provider.
    pub ttl: Duration,

    /// How long after fetching an entry may still be served on provider
    /// failure. Should be at least `ttl`.
    pub stale_if_error_ttl: Duration,

    /// Minimum time between sweeps of dead entries.
    pub cleanup_interval: Duration,
}

impl CacheConfig {
    pub fn new(ttl: Duration, stale_if_error_ttl: Duration) -> Self {
        Self {
            ttl,
            stale_if_error_ttl: stale_if_error_ttl.max(ttl),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
