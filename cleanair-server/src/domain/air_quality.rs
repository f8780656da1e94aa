//! Air-quality stations, measurements and snapshots.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::geo::Coordinate;
use super::pollutant::Pollutant;

/// A measurement station. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    /// Provider station identifier (e.g. "NL10001").
    pub id: String,

    /// Human-readable station name.
    pub name: String,

    pub location: Coordinate,

    /// Pollutants this station measures.
    pub pollutants: BTreeSet<Pollutant>,

    /// Time of the most recent data for this station.
    pub last_updated: DateTime<Utc>,
}

impl Station {
    /// Whether this station declares `pollutant`.
    pub fn measures(&self, pollutant: Pollutant) -> bool {
        self.pollutants.contains(&pollutant)
    }
}

/// A single pollutant concentration reported by a station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    pub station_id: String,
    pub pollutant: Pollutant,
    pub value: f64,
    pub unit: String,
    pub measured_at: DateTime<Utc>,
}

/// Everything one provider reported at one point in time.
///
/// Holds at most one measurement per (station, pollutant): when the
/// provider returns several, the most recent `measured_at` wins.
/// Snapshots are replaced wholesale, never merged.
#[derive(Debug, Clone)]
pub struct Snapshot {
    provider: String,
    fetched_at: DateTime<Utc>,
    stations: Vec<Station>,
    measurements: HashMap<(String, Pollutant), Measurement>,
}

impl Snapshot {
    /// Assemble a snapshot, keeping only the latest measurement per pair.
    pub fn new(
        provider: impl Into<String>,
        fetched_at: DateTime<Utc>,
        stations: Vec<Station>,
        measurements: impl IntoIterator<Item = Measurement>,
    ) -> Self {
        let mut latest: HashMap<(String, Pollutant), Measurement> = HashMap::new();
        for m in measurements {
            let key = (m.station_id.clone(), m.pollutant);
            match latest.get(&key) {
                Some(existing) if existing.measured_at >= m.measured_at => {}
                _ => {
                    latest.insert(key, m);
                }
            }
        }

        Self {
            provider: provider.into(),
            fetched_at,
            stations,
            measurements: latest,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    /// The latest measurement of `pollutant` at `station_id`.
    pub fn measurement(&self, station_id: &str, pollutant: Pollutant) -> Option<&Measurement> {
        self.measurements.get(&(station_id.to_string(), pollutant))
    }

    /// All latest measurements for one station, ordered by pollutant.
    pub fn station_measurements(&self, station_id: &str) -> Vec<&Measurement> {
        Pollutant::ALL
            .iter()
            .filter_map(|p| self.measurement(station_id, *p))
            .collect()
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
