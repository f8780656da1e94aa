//! Pollen domain types and the exposure factor.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::GridCell;

/// Exposure factor when pollen is unknown or switched off.
pub const NEUTRAL_EXPOSURE_FACTOR: f64 = 1.0;

/// Provider risk band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskLevel {
    /// Parse a provider risk string. Unknown strings count as `Low`.
    pub fn parse(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "moderate" | "medium" => RiskLevel::Moderate,
            "high" => RiskLevel::High,
            "veryhigh" => RiskLevel::VeryHigh,
            _ => RiskLevel::Low,
        }
    }

    /// 0 for `Low` up to 3 for `VeryHigh`.
    pub fn score(&self) -> u8 {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Moderate => 1,
            RiskLevel::High => 2,
            RiskLevel::VeryHigh => 3,
        }
    }
}

/// Count and risk for one pollen type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PollenLevel {
    pub count: f64,
    pub risk: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollenReading {
    pub grass: PollenLevel,
    pub tree: PollenLevel,
    pub weed: PollenLevel,
    pub observed_at: DateTime<Utc>,
}

impl PollenReading {
    pub fn max_risk(&self) -> RiskLevel {
        self.grass.risk.max(self.tree.risk).max(self.weed.risk)
    }

    /// Multiplier in `[1.0, 1.5]` applied to exposure scores:
    /// `1 + 0.5 * (max_risk_score / 3)`.
    pub fn exposure_factor(&self) -> f64 {
        1.0 + 0.5 * (f64::from(self.max_risk().score()) / 3.0)
    }
}

/// The latest reading for a grid region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalPollen {
    #[serde(serialize_with = "serialize_cell")]
    pub region: GridCell,
    pub reading: PollenReading,
}

/// Upcoming readings for a grid region, in time order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollenForecast {
    #[serde(serialize_with = "serialize_cell")]
    pub region: GridCell,
    pub readings: Vec<PollenReading>,
}

fn serialize_cell<S>(cell: &GridCell, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeStruct;

    let mut s = serializer.serialize_struct("GridCell", 3)?;
    s.serialize_field("lat", &cell.lat())?;
    s.serialize_field("lon", &cell.lon())?;
    s.serialize_field("size", &cell.size())?;
    s.end()
}
