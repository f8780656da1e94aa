//! Cached access to the air-quality snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::cache::{CacheConfig, CacheStats, ProviderCache};
use crate::context::RequestContext;
use crate::domain::{Measurement, Pollutant, Snapshot, Station};
use crate::error::ProviderError;
use crate::metrics::ProviderMetrics;

use super::client::SnapshotSource;

/// The snapshot is cached under a single global key.
const SNAPSHOT_KEY: &str = "snapshot";

/// What the snapshot cache currently holds.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub provider: String,
    pub has_data: bool,
    pub is_fresh: bool,
    pub is_usable: bool,
    pub age_secs: Option<u64>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub station_count: usize,
    pub measurement_count: usize,
}

/// Air-quality data behind a stale-if-error snapshot cache.
pub struct AirQualityService<S> {
    source: S,
    cache: ProviderCache<&'static str, Snapshot>,
}

impl<S: SnapshotSource> AirQualityService<S> {
    pub fn new(source: S, config: CacheConfig, metrics: ProviderMetrics) -> Self {
        Self {
            source,
            cache: ProviderCache::new("air_quality", config, metrics),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.source.provider_name()
    }

    /// The current snapshot, fetching it if the cached one has expired.
    pub async fn get_snapshot(&self, ctx: &RequestContext) -> Result<Arc<Snapshot>, ProviderError> {
        self.cache
            .get(ctx, &SNAPSHOT_KEY, || self.source.fetch_snapshot(ctx))
            .await
    }

    /// Every station in the current snapshot.
    pub async fn get_stations(&self, ctx: &RequestContext) -> Result<Vec<Station>, ProviderError> {
        Ok(self.get_snapshot(ctx).await?.stations().to_vec())
    }

    /// Latest value of `pollutant` at `station_id`, if the station reported one.
    pub async fn get_measurement(
        &self,
        ctx: &RequestContext,
        station_id: &str,
        pollutant: Pollutant,
    ) -> Result<Option<Measurement>, ProviderError> {
        let snapshot = self.get_snapshot(ctx).await?;
        Ok(snapshot.measurement(station_id, pollutant).cloned())
    }

    pub async fn get_station_measurements(
        &self,
        ctx: &RequestContext,
        station_id: &str,
    ) -> Result<Vec<Measurement>, ProviderError> {
        let snapshot = self.get_snapshot(ctx).await?;
        Ok(snapshot
            .station_measurements(station_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Fetch a new snapshot now, even if the cached one is fresh.
    pub async fn refresh_snapshot(
        &self,
        ctx: &RequestContext,
    ) -> Result<Arc<Snapshot>, ProviderError> {
        let snapshot = self
            .cache
            .refresh(ctx, &SNAPSHOT_KEY, || self.source.fetch_snapshot(ctx))
            .await?;
        info!(
            provider = snapshot.provider(),
            stations = snapshot.station_count(),
            "air-quality snapshot refreshed"
        );
        Ok(snapshot)
    }

    /// Drop the cached snapshot.
    pub async fn invalidate_cache(&self) {
        self.cache.invalidate().await;
    }

    /// Entry counts of the snapshot cache.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Age and contents of the cached snapshot, without fetching.
    pub async fn cache_status(&self) -> CacheStatus {
        let provider = self.provider_name().to_string();
        match self.cache.peek(&SNAPSHOT_KEY).await {
            Some(view) => CacheStatus {
                provider,
                has_data: true,
                is_fresh: view.is_fresh,
                is_usable: view.is_usable,
                age_secs: Some(view.age.as_secs()),
                fetched_at: Some(view.payload.fetched_at()),
                station_count: view.payload.station_count(),
                measurement_count: view.payload.measurement_count(),
            },
            None => CacheStatus {
                provider,
                has_data: false,
                is_fresh: false,
                is_usable: false,
                age_secs: None,
                fetched_at: None,
                station_count: 0,
                measurement_count: 0,
            },
        }
    }
}
