//! Luchtmeetnet open API client.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::domain::Snapshot;
use crate::error::ProviderError;
use crate::resilience::{HttpRequest, ResilientClient, Transport};

use super::convert::build_snapshot;
use super::types::{MeasurementDto, Page, StationDto};

/// Provider name used in snapshots, logs, metrics and health.
pub const PROVIDER_NAME: &str = "luchtmeetnet";

/// Default base URL for the Luchtmeetnet open API.
const DEFAULT_BASE_URL: &str = "https://api.luchtmeetnet.nl/open_api";

/// Configuration for the air-quality client.
#[derive(Debug, Clone)]
pub struct AirQualityConfig {
    /// Base URL for the API
    pub base_url: String,

    /// Hard cap on pages fetched per list endpoint
    pub max_pages: u32,

    /// How far back to ask for measurements
    pub lookback: Duration,
}

impl Default for AirQualityConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_pages: 50,
            lookback: Duration::from_secs(3 * 60 * 60),
        }
    }
}

impl AirQualityConfig {
    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// How far back the measurements window reaches.
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }
}

/// Anything that can produce a complete air-quality snapshot.
pub trait SnapshotSource: Send + Sync {
    fn provider_name(&self) -> &str;

    fn fetch_snapshot(
        &self,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<Snapshot, ProviderError>> + Send;
}

impl<S: SnapshotSource> SnapshotSource for Arc<S> {
    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn fetch_snapshot(
        &self,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<Snapshot, ProviderError>> + Send {
        (**self).fetch_snapshot(ctx)
    }
}

/// Client for the Luchtmeetnet station and measurement lists.
pub struct AirQualityClient<T> {
    client: ResilientClient<T>,
    config: AirQualityConfig,
}

impl<T: Transport> AirQualityClient<T> {
    pub fn new(client: ResilientClient<T>, config: AirQualityConfig) -> Self {
        Self { client, config }
    }

    /// Fetch every station row, following pagination.
    pub async fn fetch_stations(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<StationDto>, ProviderError> {
        self.fetch_all_pages(ctx, "stations", Vec::new()).await
    }

    /// Fetch recent measurement rows, following pagination.
    pub async fn fetch_measurements(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<MeasurementDto>, ProviderError> {
        let end = Utc::now();
        let lookback = chrono::Duration::from_std(self.config.lookback)
            .unwrap_or_else(|_| chrono::Duration::hours(3));
        let start = end - lookback;

        let query = vec![
            (
                "start".to_string(),
                start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "end".to_string(),
                end.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("order_by".to_string(), "timestamp_measured".to_string()),
            ("order_direction".to_string(), "desc".to_string()),
        ];
        self.fetch_all_pages(ctx, "measurements", query).await
    }

    /// Request page 1, read `last_page` from the envelope and continue
    /// until `current_page >= last_page` or the page cap is hit.
    async fn fetch_all_pages<R>(
        &self,
        ctx: &RequestContext,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<Vec<R>, ProviderError>
    where
        R: DeserializeOwned + Send,
    {
        let url = format!("{}/{}", self.config.base_url, path);
        let mut rows = Vec::new();
        let mut page = 1u32;

        loop {
            let mut request = HttpRequest::get(&url).with_query("page", page.to_string());
            for (name, value) in &query {
                request = request.with_query(name.clone(), value.clone());
            }

            let body: Page<R> = self.get_json(ctx, request).await?;
            rows.extend(body.data);

            let (current, last) = match &body.pagination {
                Some(p) => (p.current_page.unwrap_or(page), p.last_page.unwrap_or(page)),
                None => (page, page),
            };
            if current >= last {
                break;
            }
            if page >= self.config.max_pages {
                warn!(
                    provider = PROVIDER_NAME,
                    path,
                    last_page = last,
                    max_pages = self.config.max_pages,
                    "page cap reached, result truncated"
                );
                break;
            }
            page += 1;
        }

        Ok(rows)
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        request: HttpRequest,
    ) -> Result<R, ProviderError> {
        let response = self
            .client
            .execute(ctx, request)
            .await
            .map_err(|e| ProviderError::from_resilience(PROVIDER_NAME, e))?;

        if !response.is_success() {
            return Err(ProviderError::Rejected {
                provider: PROVIDER_NAME.to_string(),
                message: format!("status {}: {}", response.status, response.snippet()),
            });
        }

        response.json().map_err(|e| ProviderError::Decode {
            provider: PROVIDER_NAME.to_string(),
            message: e.to_string(),
        })
    }
}

impl<T: Transport> SnapshotSource for AirQualityClient<T> {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    /// Fetch stations and measurements concurrently and assemble one
    /// snapshot. An empty station list is reported as `NoData` so a
    /// previous snapshot stays in service.
    async fn fetch_snapshot(&self, ctx: &RequestContext) -> Result<Snapshot, ProviderError> {
        let (stations, measurements) =
            futures::try_join!(self.fetch_stations(ctx), self.fetch_measurements(ctx))?;

        if stations.is_empty() {
            return Err(ProviderError::NoData {
                provider: PROVIDER_NAME.to_string(),
            });
        }

        let snapshot = build_snapshot(PROVIDER_NAME, Utc::now(), &stations, &measurements);
        info!(
            provider = PROVIDER_NAME,
            stations = snapshot.station_count(),
            measurements = snapshot.measurement_count(),
            "fetched air-quality snapshot"
        );
        Ok(snapshot)
    }
}
