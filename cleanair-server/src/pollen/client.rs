//! Ambee pollen API client.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::context::RequestContext;
use crate::domain::GridCell;
use crate::error::ProviderError;
use crate::resilience::{HttpRequest, ResilientClient, Transport};

use super::model::{PollenForecast, PollenLevel, PollenReading, RegionalPollen, RiskLevel};
use super::types::{PollenDataDto, PollenResponseDto};

/// Provider name used in logs, metrics and health.
pub const PROVIDER_NAME: &str = "ambee";

/// Default base URL for the Ambee API.
const DEFAULT_BASE_URL: &str = "https://api.ambeedata.com";

/// Configuration for the pollen client.
#[derive(Debug, Clone)]
pub struct PollenConfig {
    /// API key for x-api-key header authentication
    pub api_key: String,

    /// Base URL for the API
    pub base_url: String,
}

impl PollenConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Anything that can report pollen for a grid region.
pub trait PollenSource: Send + Sync {
    fn provider_name(&self) -> &str;

    fn latest(
        &self,
        ctx: &RequestContext,
        region: GridCell,
    ) -> impl Future<Output = Result<RegionalPollen, ProviderError>> + Send;

    fn forecast(
        &self,
        ctx: &RequestContext,
        region: GridCell,
    ) -> impl Future<Output = Result<PollenForecast, ProviderError>> + Send;
}

impl<S: PollenSource> PollenSource for Arc<S> {
    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn latest(
        &self,
        ctx: &RequestContext,
        region: GridCell,
    ) -> impl Future<Output = Result<RegionalPollen, ProviderError>> + Send {
        (**self).latest(ctx, region)
    }

    fn forecast(
        &self,
        ctx: &RequestContext,
        region: GridCell,
    ) -> impl Future<Output = Result<PollenForecast, ProviderError>> + Send {
        (**self).forecast(ctx, region)
    }
}

/// Client for the Ambee latest and forecast pollen endpoints.
///
/// Regions are queried at their cell centre, so every coordinate in a cell
/// gets the same answer.
pub struct PollenClient<T> {
    client: ResilientClient<T>,
    config: PollenConfig,
}

impl<T: Transport> PollenClient<T> {
    pub fn new(client: ResilientClient<T>, config: PollenConfig) -> Self {
        Self { client, config }
    }

    async fn fetch(
        &self,
        ctx: &RequestContext,
        path: &str,
        region: GridCell,
    ) -> Result<PollenResponseDto, ProviderError> {
        let centre = region.centre();
        let request = HttpRequest::get(format!("{}/{}", self.config.base_url, path))
            .with_query("lat", format!("{:.4}", centre.lat()))
            .with_query("lng", format!("{:.4}", centre.lon()))
            .with_header("x-api-key", &self.config.api_key);

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

fn convert_reading(dto: &PollenDataDto) -> PollenReading {
    let counts = dto.count.as_ref();
    let risks = dto.risk.as_ref();
    let level = |count: Option<f64>, risk: Option<&String>| PollenLevel {
        count: count.unwrap_or(0.0),
        risk: risk.map_or(RiskLevel::Low, |r| RiskLevel::parse(r)),
    };

    let observed_at = dto
        .updated_at
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
        .map(|t| t.with_timezone(&Utc))
        .or_else(|| dto.time.and_then(|t| DateTime::from_timestamp(t, 0)))
        .unwrap_or_else(Utc::now);

    PollenReading {
        grass: level(
            counts.and_then(|c| c.grass_pollen),
            risks.and_then(|r| r.grass_pollen.as_ref()),
        ),
        tree: level(
            counts.and_then(|c| c.tree_pollen),
            risks.and_then(|r| r.tree_pollen.as_ref()),
        ),
        weed: level(
            counts.and_then(|c| c.weed_pollen),
            risks.and_then(|r| r.weed_pollen.as_ref()),
        ),
        observed_at,
    }
}

impl<T: Transport> PollenSource for PollenClient<T> {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn latest(
        &self,
        ctx: &RequestContext,
        region: GridCell,
    ) -> Result<RegionalPollen, ProviderError> {
        let dto = self.fetch(ctx, "latest/pollen/by-lat-lng", region).await?;
        let reading = dto
            .data
            .first()
            .map(convert_reading)
            .ok_or_else(|| ProviderError::NoData {
                provider: PROVIDER_NAME.to_string(),
            })?;

        Ok(RegionalPollen { region, reading })
    }

    async fn forecast(
        &self,
        ctx: &RequestContext,
        region: GridCell,
    ) -> Result<PollenForecast, ProviderError> {
        let dto = self.fetch(ctx, "forecast/pollen/by-lat-lng", region).await?;
        let mut readings: Vec<_> = dto.data.iter().map(convert_reading).collect();
        if readings.is_empty() {
            return Err(ProviderError::NoData {
                provider: PROVIDER_NAME.to_string(),
            });
        }
        readings.sort_by_key(|r| r.observed_at);

        Ok(PollenForecast { region, readings })
    }
}
