//! Prometheus metrics for provider requests and cache lookups.
//!
//! Metrics live in an injected [`Registry`] rather than the prometheus
//! default registry, so tests can build isolated instances.

use std::time::Duration;

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

/// Provider request latency buckets (seconds).
const PROVIDER_LATENCY_BUCKETS: &[f64] = &[
    0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Result of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Hit,
    Miss,
    /// Provider failed and an expired entry was served instead.
    Stale,
}

impl CacheOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Miss => "miss",
            CacheOutcome::Stale => "stale",
        }
    }
}

/// Metrics shared by the resilience client and the provider caches.
///
/// Cloning is cheap; clones record into the same series.
#[derive(Clone)]
pub struct ProviderMetrics {
    registry: Registry,

    /// Outbound request duration - labels: provider, outcome
    request_duration_seconds: HistogramVec,

    /// Cache lookups - labels: cache, result
    cache_lookups_total: CounterVec,
}

impl ProviderMetrics {
    /// Create the metrics and register them with `registry`.
    pub fn new(registry: Registry) -> Result<Self, prometheus::Error> {
        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "cleanair_provider_request_duration_seconds",
                "Duration of outbound provider requests in seconds",
            )
            .buckets(PROVIDER_LATENCY_BUCKETS.to_vec()),
            &["provider", "outcome"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let cache_lookups_total = CounterVec::new(
            Opts::new(
                "cleanair_cache_lookups_total",
                "Provider cache lookups by result",
            ),
            &["cache", "result"],
        )?;
        registry.register(Box::new(cache_lookups_total.clone()))?;

        Ok(Self {
            registry,
            request_duration_seconds,
            cache_lookups_total,
        })
    }

    /// Metrics on a private registry.
    #[cfg(test)]
    pub fn detached() -> Self {
        Self::new(Registry::new()).unwrap()
    }

    /// Record one outbound attempt.
    pub fn observe_request(&self, provider: &str, outcome: &str, elapsed: Duration) {
        self.request_duration_seconds
            .with_label_values(&[provider, outcome])
            .observe(elapsed.as_secs_f64());
    }

    /// Record one cache lookup.
    pub fn record_cache(&self, cache: &str, outcome: CacheOutcome) {
        self.cache_lookups_total
            .with_label_values(&[cache, outcome.as_str()])
            .inc();
    }

    /// Number of lookups recorded for `cache` with `outcome`.
    pub fn cache_count(&self, cache: &str, outcome: CacheOutcome) -> u64 {
        self.cache_lookups_total
            .with_label_values(&[cache, outcome.as_str()])
            .get() as u64
    }

    /// Number of attempts recorded for `provider` with `outcome`.
    pub fn request_count(&self, provider: &str, outcome: &str) -> u64 {
        self.request_duration_seconds
            .with_label_values(&[provider, outcome])
            .get_sample_count()
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_cache_outcomes_per_cache() {
        let metrics = ProviderMetrics::detached();
        metrics.record_cache("routing", CacheOutcome::Hit);
        metrics.record_cache("routing", CacheOutcome::Hit);
        metrics.record_cache("pollen", CacheOutcome::Miss);

        assert_eq!(metrics.cache_count("routing", CacheOutcome::Hit), 2);
        assert_eq!(metrics.cache_count("routing", CacheOutcome::Miss), 0);
        assert_eq!(metrics.cache_count("pollen", CacheOutcome::Miss), 1);
    }

    #[test]
    fn render_includes_recorded_series() {
        let metrics = ProviderMetrics::detached();
        metrics.observe_request("luchtmeetnet", "ok", Duration::from_millis(120));
        metrics.record_cache("air_quality", CacheOutcome::Stale);

        let text = metrics.render().unwrap();
        assert!(text.contains("cleanair_provider_request_duration_seconds"));
        assert!(text.contains("result=\"stale\""));
        assert_eq!(metrics.request_count("luchtmeetnet", "ok"), 1);
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = Registry::new();
        assert!(ProviderMetrics::new(registry.clone()).is_ok());
        assert!(ProviderMetrics::new(registry).is_err());
    }
}
