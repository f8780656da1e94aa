//! Region-keyed pollen caches and the exposure factor.

use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheConfig, CacheStats, ProviderCache};
use crate::context::RequestContext;
use crate::domain::{Coordinate, GridCell};
use crate::error::ProviderError;
use crate::flags::{FlagLookup, POLLEN_FACTOR_DISABLED};
use crate::metrics::ProviderMetrics;

use super::client::PollenSource;
use super::model::{NEUTRAL_EXPOSURE_FACTOR, PollenForecast, RegionalPollen};

/// Default region size in degrees (about 11 km of latitude).
pub const DEFAULT_POLLEN_GRID_SIZE: f64 = 0.1;

/// Pollen data behind two stale-if-error caches, one for latest readings
/// and one for forecasts.
///
/// Every getter consults the `pollen_factor_disabled` flag first; while it
/// is set nothing is served, cached or not.
pub struct PollenService<S> {
    source: S,
    flags: Arc<dyn FlagLookup>,
    grid_size: f64,
    latest: ProviderCache<GridCell, RegionalPollen>,
    forecasts: ProviderCache<GridCell, PollenForecast>,
}

impl<S: PollenSource> PollenService<S> {
    pub fn new(
        source: S,
        flags: Arc<dyn FlagLookup>,
        config: CacheConfig,
        metrics: ProviderMetrics,
    ) -> Self {
        Self {
            source,
            flags,
            grid_size: DEFAULT_POLLEN_GRID_SIZE,
            latest: ProviderCache::new("pollen", config.clone(), metrics.clone()),
            forecasts: ProviderCache::new("pollen_forecast", config, metrics),
        }
    }

    /// Non-positive or non-finite sizes are ignored.
    pub fn with_grid_size(mut self, grid_size: f64) -> Self {
        if grid_size.is_finite() && grid_size > 0.0 {
            self.grid_size = grid_size;
        }
        self
    }

    pub fn provider_name(&self) -> &str {
        self.source.provider_name()
    }

    /// False while the disable flag is set.
    pub fn is_enabled(&self) -> bool {
        !self.flags.is_enabled(POLLEN_FACTOR_DISABLED)
    }

    fn ensure_enabled(&self) -> Result<(), ProviderError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(ProviderError::Disabled("pollen".to_string()))
        }
    }

    /// Latest pollen reading for the region containing `location`.
    pub async fn get_regional_pollen(
        &self,
        ctx: &RequestContext,
        location: Coordinate,
    ) -> Result<Arc<RegionalPollen>, ProviderError> {
        self.ensure_enabled()?;
        let region = location.grid_cell(self.grid_size);
        self.latest
            .get(ctx, &region, || self.source.latest(ctx, region))
            .await
    }

    /// Pollen forecast for the region containing `location`.
    pub async fn get_forecast(
        &self,
        ctx: &RequestContext,
        location: Coordinate,
    ) -> Result<Arc<PollenForecast>, ProviderError> {
        self.ensure_enabled()?;
        let region = location.grid_cell(self.grid_size);
        self.forecasts
            .get(ctx, &region, || self.source.forecast(ctx, region))
            .await
    }

    /// Exposure multiplier for `location`, never failing: any error or the
    /// disable flag yields the neutral factor 1.0.
    pub async fn get_exposure_factor(&self, ctx: &RequestContext, location: Coordinate) -> f64 {
        match self.get_regional_pollen(ctx, location).await {
            Ok(pollen) => pollen.reading.exposure_factor(),
            Err(err) => {
                debug!(%location, error = %err, "using neutral pollen exposure factor");
                NEUTRAL_EXPOSURE_FACTOR
            }
        }
    }

    /// Drop both caches.
    pub async fn invalidate_cache(&self) {
        self.latest.invalidate().await;
        self.forecasts.invalidate().await;
    }

    /// Combined stats of both caches.
    pub async fn cache_stats(&self) -> CacheStats {
        let latest = self.latest.stats().await;
        let forecasts = self.forecasts.stats().await;
        CacheStats {
            total: latest.total + forecasts.total,
            fresh: latest.fresh + forecasts.fresh,
            stale: latest.stale + forecasts.stale,
        }
    }
}
