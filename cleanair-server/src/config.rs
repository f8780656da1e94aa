//! Process configuration read from `CLEANAIR_*` environment variables.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::air_quality::AirQualityConfig;
use crate::cache::{CacheConfig, DEFAULT_CLEANUP_INTERVAL};
use crate::interpolate::InterpolationConfig;
use crate::pollen::{DEFAULT_POLLEN_GRID_SIZE, PollenConfig};
use crate::resilience::{BreakerConfig, RetryPolicy};
use crate::routing::{DEFAULT_ROUTE_GRID_SIZE, RoutingConfig};

/// Errors from reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Everything `main` needs to assemble the server.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,

    /// Budget for one inbound request, covering every provider call it makes.
    pub request_timeout: Duration,

    /// Timeout for a single outbound HTTP call.
    pub http_timeout: Duration,

    /// How often the air-quality snapshot is refreshed in the background.
    pub refresh_interval: Duration,

    pub air_quality: AirQualityConfig,
    pub air_quality_cache: CacheConfig,

    pub routing: RoutingConfig,
    pub routing_cache: CacheConfig,
    pub route_grid_size: f64,

    pub pollen: PollenConfig,
    pub pollen_cache: CacheConfig,
    pub pollen_grid_size: f64,

    pub breaker: BreakerConfig,
    pub retry: RetryPolicy,
    pub interpolation: InterpolationConfig,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// # Environment Variables
    /// - `CLEANAIR_LISTEN_ADDR` (default `0.0.0.0:3000`)
    /// - `CLEANAIR_REQUEST_TIMEOUT_SECS` (default 10)
    /// - `CLEANAIR_HTTP_TIMEOUT_SECS` (default 5)
    /// - `CLEANAIR_REFRESH_INTERVAL_SECS` (default 900)
    /// - `CLEANAIR_AIR_QUALITY_BASE_URL`, `CLEANAIR_AIR_QUALITY_TTL_SECS` (900),
    ///   `CLEANAIR_AIR_QUALITY_STALE_SECS` (7200),
    ///   `CLEANAIR_AIR_QUALITY_LOOKBACK_SECS` (10800)
    /// - `CLEANAIR_ORS_API_KEY`, `CLEANAIR_ROUTING_BASE_URL`,
    ///   `CLEANAIR_ROUTING_TTL_SECS` (1800), `CLEANAIR_ROUTING_STALE_SECS` (21600),
    ///   `CLEANAIR_ROUTE_GRID_SIZE` (0.001), `CLEANAIR_ROUTE_ALTERNATIVES` (3)
    /// - `CLEANAIR_AMBEE_API_KEY`, `CLEANAIR_POLLEN_BASE_URL`,
    ///   `CLEANAIR_POLLEN_TTL_SECS` (3600), `CLEANAIR_POLLEN_STALE_SECS` (43200),
    ///   `CLEANAIR_POLLEN_GRID_SIZE` (0.1)
    /// - `CLEANAIR_CACHE_CLEANUP_SECS` (600)
    /// - `CLEANAIR_BREAKER_OPEN_SECS` (30), `CLEANAIR_RETRY_MAX` (3)
    /// - `CLEANAIR_IDW_MAX_DISTANCE_M` (50000), `CLEANAIR_IDW_MAX_STATIONS` (5),
    ///   `CLEANAIR_IDW_POWER` (2)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Config::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup: &lookup };

        let cleanup = vars.secs("CLEANAIR_CACHE_CLEANUP_SECS", DEFAULT_CLEANUP_INTERVAL)?;
        let cache = |ttl: Duration, stale: Duration| {
            CacheConfig::new(ttl, stale).with_cleanup_interval(cleanup)
        };

        let mut air_quality = AirQualityConfig::default();
        let lookback = vars.secs("CLEANAIR_AIR_QUALITY_LOOKBACK_SECS", air_quality.lookback)?;
        air_quality = air_quality.with_lookback(lookback);
        if let Some(url) = vars.string("CLEANAIR_AIR_QUALITY_BASE_URL") {
            air_quality = air_quality.with_base_url(url);
        }

        let ors_key = vars.api_key("CLEANAIR_ORS_API_KEY", "Routing");
        let mut routing = RoutingConfig::new(ors_key);
        let alternative_count =
            vars.parse("CLEANAIR_ROUTE_ALTERNATIVES", routing.alternative_count)?;
        routing = routing.with_alternative_count(alternative_count);
        if let Some(url) = vars.string("CLEANAIR_ROUTING_BASE_URL") {
            routing = routing.with_base_url(url);
        }

        let ambee_key = vars.api_key("CLEANAIR_AMBEE_API_KEY", "Pollen");
        let mut pollen = PollenConfig::new(ambee_key);
        if let Some(url) = vars.string("CLEANAIR_POLLEN_BASE_URL") {
            pollen = pollen.with_base_url(url);
        }

        let breaker = BreakerConfig::default().with_open_timeout(
            vars.secs("CLEANAIR_BREAKER_OPEN_SECS", Duration::from_secs(30))?,
        );
        let retry = RetryPolicy::default().with_max_retries(vars.parse("CLEANAIR_RETRY_MAX", 3)?);

        let interpolation = InterpolationConfig::default()
            .with_max_distance(vars.parse("CLEANAIR_IDW_MAX_DISTANCE_M", 50_000.0)?)
            .with_station_limits(1, vars.parse("CLEANAIR_IDW_MAX_STATIONS", 5)?)
            .with_power(vars.parse("CLEANAIR_IDW_POWER", 2.0)?);

        Ok(Self {
            listen_addr: vars.parse("CLEANAIR_LISTEN_ADDR", default_listen_addr())?,
            request_timeout: vars.secs("CLEANAIR_REQUEST_TIMEOUT_SECS", Duration::from_secs(10))?,
            http_timeout: vars.secs("CLEANAIR_HTTP_TIMEOUT_SECS", Duration::from_secs(5))?,
            refresh_interval: vars
                .secs("CLEANAIR_REFRESH_INTERVAL_SECS", Duration::from_secs(15 * 60))?,
            air_quality,
            air_quality_cache: cache(
                vars.secs("CLEANAIR_AIR_QUALITY_TTL_SECS", Duration::from_secs(15 * 60))?,
                vars.secs("CLEANAIR_AIR_QUALITY_STALE_SECS", Duration::from_secs(2 * 3600))?,
            ),
            routing,
            routing_cache: cache(
                vars.secs("CLEANAIR_ROUTING_TTL_SECS", Duration::from_secs(30 * 60))?,
                vars.secs("CLEANAIR_ROUTING_STALE_SECS", Duration::from_secs(6 * 3600))?,
            ),
            route_grid_size: vars.grid("CLEANAIR_ROUTE_GRID_SIZE", DEFAULT_ROUTE_GRID_SIZE)?,
            pollen,
            pollen_cache: cache(
                vars.secs("CLEANAIR_POLLEN_TTL_SECS", Duration::from_secs(3600))?,
                vars.secs("CLEANAIR_POLLEN_STALE_SECS", Duration::from_secs(12 * 3600))?,
            ),
            pollen_grid_size: vars.grid("CLEANAIR_POLLEN_GRID_SIZE", DEFAULT_POLLEN_GRID_SIZE)?,
            breaker,
            retry,
            interpolation,
        })
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    /// Unset and blank are the same.
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.string(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: name,
                value: raw,
            }),
        }
    }

    fn secs(&self, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(name, default.as_secs()).map(Duration::from_secs)
    }

    fn grid(&self, name: &'static str, default: f64) -> Result<f64, ConfigError> {
        let size = self.parse(name, default)?;
        if size.is_finite() && size > 0.0 {
            Ok(size)
        } else {
            Err(ConfigError::Invalid {
                var: name,
                value: size.to_string(),
            })
        }
    }

    /// A missing key is not fatal: the server starts and that provider
    /// reports unavailable.
    fn api_key(&self, name: &str, what: &str) -> String {
        self.string(name).unwrap_or_else(|| {
            warn!(var = name, "{what} API key not set; {what} calls will fail");
            String::new()
        })
    }
}
