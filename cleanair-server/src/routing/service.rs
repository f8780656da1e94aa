//! Grid-keyed cache in front of the routing provider.

use std::sync::Arc;

use crate::cache::{CacheConfig, CacheStats, ProviderCache};
use crate::context::RequestContext;
use crate::metrics::ProviderMetrics;

use super::client::DirectionsSource;
use super::error::RoutingError;
use super::model::{DirectionsRequest, DirectionsResponse, RouteKey};

/// Default grid cell size in degrees (about 110 m of latitude).
pub const DEFAULT_ROUTE_GRID_SIZE: f64 = 0.001;

/// Directions with stale-if-error caching.
///
/// Requests whose endpoints fall in the same grid cells, with the same
/// profile and alternatives flag, share one cached answer.
pub struct RoutingService<S> {
    source: S,
    grid_size: f64,
    cache: ProviderCache<RouteKey, DirectionsResponse>,
}

impl<S: DirectionsSource> RoutingService<S> {
    pub fn new(source: S, config: CacheConfig, metrics: ProviderMetrics) -> Self {
        Self {
            source,
            grid_size: DEFAULT_ROUTE_GRID_SIZE,
            cache: ProviderCache::new("routing", config, metrics),
        }
    }

    /// Non-positive or non-finite sizes are ignored.
    pub fn with_grid_size(mut self, grid_size: f64) -> Self {
        if grid_size.is_finite() && grid_size > 0.0 {
            self.grid_size = grid_size;
        }
        self
    }

    pub fn grid_size(&self) -> f64 {
        self.grid_size
    }

    pub fn provider_name(&self) -> &str {
        self.source.provider_name()
    }

    /// Routes for `request`, cached per grid-snapped origin and destination.
    pub async fn get_directions(
        &self,
        ctx: &RequestContext,
        request: &DirectionsRequest,
    ) -> Result<Arc<DirectionsResponse>, RoutingError> {
        let key = RouteKey::for_request(request, self.grid_size);
        self.cache
            .get(ctx, &key, || self.source.directions(ctx, request))
            .await
    }

    /// Drop every cached route.
    pub async fn invalidate_cache(&self) {
        self.cache.invalidate().await;
    }

    /// Entry counts of the route cache.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
