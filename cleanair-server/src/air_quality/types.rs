//! Luchtmeetnet open API response DTOs.
//!
//! Every list endpoint wraps its rows in the same paginated envelope.
//! Fields are optional wherever the API has been seen to omit them.

use serde::Deserialize;

/// Paginated list envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub pagination: Option<Pagination>,

    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    pub current_page: Option<u32>,
    pub last_page: Option<u32>,
}

/// A row of `/stations`.
#[derive(Debug, Clone, Deserialize)]
pub struct StationDto {
    /// Station identifier, e.g. `NL10938`.
    pub number: String,

    /// Human-readable station name.
    pub location: Option<String>,

    pub geometry: Option<GeometryDto>,

    /// Formulas the station declares it measures.
    #[serde(default)]
    pub components: Vec<String>,
}

/// GeoJSON point. Coordinates are `[lon, lat]`.
#[derive(Debug, Clone, Deserialize)]
pub struct GeometryDto {
    pub coordinates: Vec<f64>,
}

/// A row of `/measurements`.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementDto {
    pub station_number: String,
    pub value: Option<f64>,

    /// ISO 8601 with offset.
    pub timestamp_measured: String,

    pub formula: String,
}
