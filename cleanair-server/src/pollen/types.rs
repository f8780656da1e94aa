//! Ambee pollen API response DTOs.

use serde::Deserialize;

/// Envelope shared by the latest and forecast endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PollenResponseDto {
    pub message: Option<String>,

    #[serde(default)]
    pub data: Vec<PollenDataDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollenDataDto {
    #[serde(rename = "Count")]
    pub count: Option<PollenTypesDto<f64>>,

    #[serde(rename = "Risk")]
    pub risk: Option<PollenTypesDto<String>>,

    /// ISO 8601; set on latest readings.
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,

    /// Unix seconds; set on forecast rows.
    pub time: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollenTypesDto<T> {
    pub grass_pollen: Option<T>,
    pub tree_pollen: Option<T>,
    pub weed_pollen: Option<T>,
}
