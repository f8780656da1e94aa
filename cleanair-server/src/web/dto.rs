//! Data transfer objects for web requests and responses.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::air_quality::CacheStatus;
use crate::cache::CacheStats;
use crate::domain::{Coordinate, InvalidCoordinate, Measurement, Pollutant, Snapshot};
use crate::interpolate::{Confidence, InterpolatedPoint, InterpolatedValue};
use crate::pollen::RegionalPollen;
use crate::resilience::{CircuitState, DependencyHealth, HealthStatus};
use crate::routing::{DirectionsRequest, RoutingProfile};

/// A `?lat=..&lon=..` query.
#[derive(Debug, Deserialize)]
pub struct PointQuery {
    pub lat: f64,
    pub lon: f64,
}

impl PointQuery {
    pub fn coordinate(&self) -> Result<Coordinate, InvalidCoordinate> {
        Coordinate::new(self.lat, self.lon)
    }
}

/// Estimated air quality at one point.
///
/// Missing data shows up as `warnings` and absent fields, never as an
/// error status.
#[derive(Debug, Serialize)]
pub struct PointResponse {
    pub location: Coordinate,

    /// Lowest confidence across `values`; absent when nothing was estimated
    pub confidence: Option<Confidence>,

    pub values: BTreeMap<Pollutant, InterpolatedValue>,

    /// When the underlying station data was fetched
    pub snapshot_fetched_at: Option<DateTime<Utc>>,

    /// Pollen multiplier; 1.0 when pollen is unknown or disabled
    pub exposure_factor: f64,

    pub warnings: Vec<String>,
}

impl PointResponse {
    pub fn new(location: Coordinate, exposure_factor: f64) -> Self {
        Self {
            location,
            confidence: None,
            values: BTreeMap::new(),
            snapshot_fetched_at: None,
            exposure_factor,
            warnings: Vec::new(),
        }
    }

    pub fn with_point(mut self, point: InterpolatedPoint) -> Self {
        self.confidence = Some(point.confidence());
        self.snapshot_fetched_at = Some(point.snapshot_fetched_at);
        self.values = point.values;
        self
    }
}

/// A monitoring station with its latest measurements.
#[derive(Debug, Serialize)]
pub struct StationResult {
    pub id: String,
    pub name: String,
    pub location: Coordinate,
    pub pollutants: Vec<Pollutant>,
    pub last_updated: DateTime<Utc>,
    pub measurements: Vec<Measurement>,
}

#[derive(Debug, Serialize)]
pub struct StationsResponse {
    pub provider: String,
    pub fetched_at: DateTime<Utc>,
    pub stations: Vec<StationResult>,
}

impl StationsResponse {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let stations = snapshot
            .stations()
            .iter()
            .map(|station| StationResult {
                id: station.id.clone(),
                name: station.name.clone(),
                location: station.location,
                pollutants: station.pollutants.iter().copied().collect(),
                last_updated: station.last_updated,
                measurements: snapshot
                    .station_measurements(&station.id)
                    .into_iter()
                    .cloned()
                    .collect(),
            })
            .collect();

        Self {
            provider: snapshot.provider().to_string(),
            fetched_at: snapshot.fetched_at(),
            stations,
        }
    }
}

/// Pollen at one point. `exposure_factor` is always present.
#[derive(Debug, Serialize)]
pub struct PollenResponse {
    pub enabled: bool,
    pub exposure_factor: f64,
    pub pollen: Option<RegionalPollen>,
    pub warnings: Vec<String>,
}

/// A point in a JSON request body.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Body of `POST /directions`.
#[derive(Debug, Deserialize)]
pub struct DirectionsBody {
    pub origin: LatLon,
    pub destination: LatLon,

    /// Defaults to cycling
    pub profile: Option<RoutingProfile>,

    #[serde(default)]
    pub alternatives: bool,
}

impl DirectionsBody {
    pub fn into_request(self) -> Result<DirectionsRequest, InvalidCoordinate> {
        let origin = Coordinate::new(self.origin.lat, self.origin.lon)?;
        let destination = Coordinate::new(self.destination.lat, self.destination.lon)?;
        Ok(DirectionsRequest::new(
            origin,
            destination,
            self.profile.unwrap_or(RoutingProfile::Cycling),
        )
        .with_alternatives(self.alternatives))
    }
}

/// One dependency in the status report.
#[derive(Debug, Serialize)]
pub struct DependencyStatus {
    pub status: HealthStatus,

    #[serde(flatten)]
    pub health: DependencyHealth,
}

impl DependencyStatus {
    /// `breaker_state` is the live state, which may have moved on since the
    /// last recorded call (for example open to half-open).
    pub fn new(mut health: DependencyHealth, breaker_state: Option<CircuitState>) -> Self {
        if let Some(state) = breaker_state {
            health.state = state;
        }
        Self {
            status: health.status(),
            health,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CacheReport {
    pub air_quality: CacheStatus,
    pub routing: CacheStats,
    pub pollen: CacheStats,
}

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Worst status across all dependencies
    pub status: HealthStatus,
    pub dependencies: Vec<DependencyStatus>,
    pub caches: CacheReport,
    pub pollen_enabled: bool,
}

/// Which caches `POST /admin/cache/invalidate` clears.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTarget {
    #[default]
    All,
    AirQuality,
    Routing,
    Pollen,
}

#[derive(Debug, Deserialize)]
pub struct InvalidateQuery {
    #[serde(default)]
    pub cache: CacheTarget,
}

#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub invalidated: Vec<&'static str>,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Worst of `statuses`, healthy when there are none.
pub fn overall_status(statuses: impl IntoIterator<Item = HealthStatus>) -> HealthStatus {
    statuses
        .into_iter()
        .fold(HealthStatus::Healthy, |worst, s| match (worst, s) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        })
}
