//! Application state for the web layer.

use std::sync::Arc;
use std::time::Duration;

use crate::air_quality::{self, AirQualityClient, AirQualityService};
use crate::config::Config;
use crate::flags::FlagLookup;
use crate::interpolate::Interpolator;
use crate::metrics::ProviderMetrics;
use crate::pollen::{self, PollenClient, PollenService};
use crate::resilience::{
    BreakerRegistry, HealthRegistry, InMemoryHealthRegistry, ReqwestTransport, ResilientClient,
    Transport,
};
use crate::routing::{self, RoutingClient, RoutingService};

/// Shared application state.
///
/// Generic over the outbound transport so the whole stack can run against
/// fakes; production uses [`ReqwestTransport`].
pub struct AppState<T = ReqwestTransport> {
    pub air_quality: Arc<AirQualityService<AirQualityClient<T>>>,
    pub routing: Arc<RoutingService<RoutingClient<T>>>,
    pub pollen: Arc<PollenService<PollenClient<T>>>,
    pub interpolator: Arc<Interpolator>,
    pub health: Arc<dyn HealthRegistry>,
    pub breakers: Arc<BreakerRegistry>,
    pub metrics: ProviderMetrics,

    /// Budget for all provider calls made by one request
    pub request_timeout: Duration,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            air_quality: self.air_quality.clone(),
            routing: self.routing.clone(),
            pollen: self.pollen.clone(),
            interpolator: self.interpolator.clone(),
            health: self.health.clone(),
            breakers: self.breakers.clone(),
            metrics: self.metrics.clone(),
            request_timeout: self.request_timeout,
        }
    }
}

impl<T: Transport + Clone> AppState<T> {
    /// Wire every provider through its own breaker, sharing one transport,
    /// health registry and metrics sink.
    pub fn new(
        config: &Config,
        transport: T,
        flags: Arc<dyn FlagLookup>,
        metrics: ProviderMetrics,
    ) -> Self {
        let health: Arc<dyn HealthRegistry> = Arc::new(InMemoryHealthRegistry::new());
        let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));

        let resilient = |dependency: &str| {
            ResilientClient::new(
                dependency,
                transport.clone(),
                breakers.breaker(dependency),
                health.clone(),
                metrics.clone(),
            )
            .with_retry(config.retry.clone())
        };

        let air_quality = AirQualityService::new(
            AirQualityClient::new(
                resilient(air_quality::PROVIDER_NAME),
                config.air_quality.clone(),
            ),
            config.air_quality_cache.clone(),
            metrics.clone(),
        );

        let routing = RoutingService::new(
            RoutingClient::new(resilient(routing::PROVIDER_NAME), config.routing.clone()),
            config.routing_cache.clone(),
            metrics.clone(),
        )
        .with_grid_size(config.route_grid_size);

        let pollen = PollenService::new(
            PollenClient::new(resilient(pollen::PROVIDER_NAME), config.pollen.clone()),
            flags,
            config.pollen_cache.clone(),
            metrics.clone(),
        )
        .with_grid_size(config.pollen_grid_size);

        Self {
            air_quality: Arc::new(air_quality),
            routing: Arc::new(routing),
            pollen: Arc::new(pollen),
            interpolator: Arc::new(Interpolator::new(config.interpolation.clone())),
            health,
            breakers,
            metrics,
            request_timeout: config.request_timeout,
        }
    }
}
