//! Inverse-distance-weighted interpolation over an air-quality snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Coordinate, InvalidCoordinate, Pollutant, Snapshot, Station};

use super::config::InterpolationConfig;

/// Stations closer than this (metres) are treated as co-located.
pub const NEAR_STATION_DISTANCE_M: f64 = 1.0;

/// Weight given to a co-located station. Large enough to dominate, while
/// other stations still contribute a negligible share.
pub const NEAR_STATION_WEIGHT: f64 = 1e10;

/// Errors from interpolation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InterpolationError {
    /// No snapshot, an empty snapshot, or too few stations within range.
    #[error("no monitoring stations in range")]
    NoStationsInRange,

    /// Stations are in range but none has a usable measurement.
    #[error("no usable measurements near this location")]
    InsufficientData,

    #[error(transparent)]
    InvalidCoordinates(#[from] InvalidCoordinate),
}

/// How much an interpolated value can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// One station's share of an interpolated value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub station_id: String,
    pub distance_m: f64,
    pub value: f64,
    /// Normalized; the weights of one value sum to 1.
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterpolatedValue {
    pub pollutant: Pollutant,
    pub value: f64,
    pub confidence: Confidence,
    pub station_count: usize,
    pub nearest_distance_m: f64,
    /// Nearest first.
    pub contributions: Vec<Contribution>,
}

/// Every pollutant that could be estimated at one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterpolatedPoint {
    pub location: Coordinate,
    pub values: BTreeMap<Pollutant, InterpolatedValue>,
    pub snapshot_fetched_at: DateTime<Utc>,
}

impl InterpolatedPoint {
    pub fn get(&self, pollutant: Pollutant) -> Option<&InterpolatedValue> {
        self.values.get(&pollutant)
    }

    /// The weakest confidence across all estimated pollutants.
    pub fn confidence(&self) -> Confidence {
        self.values
            .values()
            .map(|v| v.confidence)
            .min()
            .unwrap_or(Confidence::Low)
    }
}

/// Estimates pollutant concentrations between monitoring stations.
///
/// Stateless apart from its configuration: snapshots are borrowed per call,
/// so one interpolator can be shared freely across tasks.
#[derive(Debug, Clone, Default)]
pub struct Interpolator {
    config: InterpolationConfig,
}

impl Interpolator {
    pub fn new(config: InterpolationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    /// Interpolate every pollutant at (`lat`, `lon`).
    pub fn interpolate(
        &self,
        lat: f64,
        lon: f64,
        snapshot: Option<&Snapshot>,
    ) -> Result<InterpolatedPoint, InterpolationError> {
        let location = Coordinate::new(lat, lon)?;
        self.interpolate_at(location, snapshot)
    }

    pub fn interpolate_at(
        &self,
        location: Coordinate,
        snapshot: Option<&Snapshot>,
    ) -> Result<InterpolatedPoint, InterpolationError> {
        let Some(snapshot) = snapshot.filter(|s| !s.stations().is_empty()) else {
            return Err(InterpolationError::NoStationsInRange);
        };

        let mut nearby: Vec<(&Station, f64)> = snapshot
            .stations()
            .iter()
            .map(|s| (s, location.distance_to(&s.location)))
            .filter(|(_, d)| *d <= self.config.max_distance_m)
            .collect();

        if nearby.is_empty() || nearby.len() < self.config.min_stations {
            return Err(InterpolationError::NoStationsInRange);
        }

        nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
        nearby.truncate(self.config.max_stations.max(1));

        let mut values = BTreeMap::new();
        for pollutant in Pollutant::ALL {
            let samples: Vec<(&str, f64, f64)> = nearby
                .iter()
                .filter(|(station, _)| station.measures(pollutant))
                .filter_map(|(station, distance)| {
                    snapshot
                        .measurement(&station.id, pollutant)
                        .map(|m| (station.id.as_str(), *distance, m.value))
                })
                .collect();

            if let Some(value) = self.weigh(pollutant, &samples) {
                values.insert(pollutant, value);
            }
        }

        if values.is_empty() {
            return Err(InterpolationError::InsufficientData);
        }

        Ok(InterpolatedPoint {
            location,
            values,
            snapshot_fetched_at: snapshot.fetched_at(),
        })
    }

    /// Interpolate each `(lat, lon)`; points that fail are `None`.
    pub fn interpolate_multiple(
        &self,
        points: &[(f64, f64)],
        snapshot: Option<&Snapshot>,
    ) -> Vec<Option<InterpolatedPoint>> {
        points
            .iter()
            .map(|&(lat, lon)| self.interpolate(lat, lon, snapshot).ok())
            .collect()
    }

    /// Combine `(station_id, distance, value)` samples, nearest first.
    fn weigh(
        &self,
        pollutant: Pollutant,
        samples: &[(&str, f64, f64)],
    ) -> Option<InterpolatedValue> {
        let nearest_distance_m = samples.first()?.1;

        let raw: Vec<f64> = samples
            .iter()
            .map(|&(_, distance, _)| self.raw_weight(distance))
            .collect();
        let total: f64 = raw.iter().sum();

        let contributions: Vec<Contribution> = samples
            .iter()
            .zip(&raw)
            .map(|(&(station_id, distance_m, value), w)| Contribution {
                station_id: station_id.to_string(),
                distance_m,
                value,
                weight: w / total,
            })
            .collect();
        let value = contributions.iter().map(|c| c.value * c.weight).sum();

        Some(InterpolatedValue {
            pollutant,
            value,
            confidence: self.confidence(nearest_distance_m, samples.len()),
            station_count: samples.len(),
            nearest_distance_m,
            contributions,
        })
    }

    fn raw_weight(&self, distance_m: f64) -> f64 {
        if distance_m < NEAR_STATION_DISTANCE_M {
            NEAR_STATION_WEIGHT
        } else {
            1.0 / distance_m.powf(self.config.power)
        }
    }

    fn confidence(&self, nearest_m: f64, station_count: usize) -> Confidence {
        if nearest_m <= self.config.high_confidence_m && station_count >= 2 {
            Confidence::High
        } else if nearest_m <= self.config.medium_confidence_m && station_count >= 1 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;
    use crate::domain::Measurement;

    const NO2_TEN: &[(Pollutant, f64)] = &[(Pollutant::No2, 10.0)];

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    /// `(id, lat, lon, [(pollutant, value)])`
    fn snapshot(stations: &[(&str, f64, f64, &[(Pollutant, f64)])]) -> Snapshot {
        let mut domain_stations = Vec::new();
        let mut measurements = Vec::new();
        for (id, lat, lon, values) in stations {
            domain_stations.push(Station {
                id: id.to_string(),
                name: id.to_string(),
                location: Coordinate::new(*lat, *lon).unwrap(),
                pollutants: values.iter().map(|(p, _)| *p).collect::<BTreeSet<_>>(),
                last_updated: at(),
            });
            for (pollutant, value) in values.iter() {
                measurements.push(Measurement {
                    station_id: id.to_string(),
                    pollutant: *pollutant,
                    value: *value,
                    unit: "µg/m³".into(),
                    measured_at: at(),
                });
            }
        }
        Snapshot::new("test", at(), domain_stations, measurements)
    }

    #[test]
    fn amsterdam_scenario() {
        let snapshot = snapshot(&[
            ("NL10001", 52.3702, 4.8952, &[(Pollutant::No2, 30.0)]),
            ("NL10002", 52.375, 4.85, &[(Pollutant::No2, 25.0)]),
        ]);

        let point = Interpolator::default()
            .interpolate(52.370, 4.89, Some(&snapshot))
            .unwrap();
        let no2 = point.get(Pollutant::No2).unwrap();

        assert!(no2.value > 25.0 && no2.value < 35.0, "got {}", no2.value);
        assert!(no2.station_count >= 2);
        assert_eq!(no2.confidence, Confidence::High);
        assert_eq!(no2.contributions[0].station_id, "NL10001");
        assert_eq!(point.snapshot_fetched_at, at());
        assert!(point.get(Pollutant::O3).is_none());
    }

    #[test]
    fn nearer_station_dominates() {
        // About 111 m and 1.67 km due north of the query point.
        let snapshot = snapshot(&[
            ("near", 52.001, 5.0, &[(Pollutant::Pm10, 10.0)]),
            ("far", 52.015, 5.0, &[(Pollutant::Pm10, 100.0)]),
        ]);

        let point = Interpolator::default()
            .interpolate(52.0, 5.0, Some(&snapshot))
            .unwrap();
        let pm10 = point.get(Pollutant::Pm10).unwrap();

        assert!((pm10.value - 10.0).abs() < (pm10.value - 100.0).abs());
        assert!(pm10.value < 11.0, "got {}", pm10.value);
    }

    #[test]
    fn exact_station_location_converges() {
        let snapshot = snapshot(&[
            ("here", 52.1, 5.1, &[(Pollutant::O3, 42.0)]),
            ("there", 52.11, 5.1, &[(Pollutant::O3, 80.0)]),
        ]);

        let point = Interpolator::default()
            .interpolate(52.1, 5.1, Some(&snapshot))
            .unwrap();
        let o3 = point.get(Pollutant::O3).unwrap();

        assert!((o3.value - 42.0).abs() < 0.5, "got {}", o3.value);
        assert_eq!(o3.nearest_distance_m, 0.0);
    }

    #[test]
    fn stations_beyond_range_are_excluded() {
        let snapshot = snapshot(&[("far", 53.0, 5.0, &[(Pollutant::No2, 20.0)])]);

        let err = Interpolator::default()
            .interpolate(52.0, 5.0, Some(&snapshot))
            .unwrap_err();
        assert_eq!(err, InterpolationError::NoStationsInRange);
    }

    #[test]
    fn absent_or_empty_snapshot() {
        let interpolator = Interpolator::default();
        assert_eq!(
            interpolator.interpolate(52.0, 5.0, None).unwrap_err(),
            InterpolationError::NoStationsInRange
        );
        let empty = Snapshot::new("test", at(), vec![], vec![]);
        assert_eq!(
            interpolator.interpolate(52.0, 5.0, Some(&empty)).unwrap_err(),
            InterpolationError::NoStationsInRange
        );
    }

    #[test]
    fn stations_without_measurements_are_insufficient() {
        let mut snapshot_stations = snapshot(&[("quiet", 52.0, 5.0, &[])]).stations().to_vec();
        snapshot_stations[0].pollutants.insert(Pollutant::No2);
        let snapshot = Snapshot::new("test", at(), snapshot_stations, vec![]);

        let err = Interpolator::default()
            .interpolate(52.001, 5.0, Some(&snapshot))
            .unwrap_err();
        assert_eq!(err, InterpolationError::InsufficientData);
    }

    #[test]
    fn min_stations_is_enforced() {
        let snapshot = snapshot(&[("only", 52.0, 5.0, &[(Pollutant::No2, 20.0)])]);
        let interpolator =
            Interpolator::new(InterpolationConfig::default().with_station_limits(2, 5));

        assert_eq!(
            interpolator.interpolate(52.01, 5.0, Some(&snapshot)).unwrap_err(),
            InterpolationError::NoStationsInRange
        );
    }

    #[test]
    fn only_nearest_stations_are_used() {
        let stations: Vec<(String, f64)> =
            (0..8).map(|i| (format!("S{i}"), 52.0 + 0.01 * (i + 1) as f64)).collect();
        let rows: Vec<(&str, f64, f64, &[(Pollutant, f64)])> = stations
            .iter()
            .map(|(id, lat)| (id.as_str(), *lat, 5.0, NO2_TEN))
            .collect();
        let snapshot = snapshot(&rows);

        let point = Interpolator::default()
            .interpolate(52.0, 5.0, Some(&snapshot))
            .unwrap();
        let no2 = point.get(Pollutant::No2).unwrap();

        assert_eq!(no2.station_count, 5);
        let ids: Vec<_> = no2.contributions.iter().map(|c| c.station_id.as_str()).collect();
        assert_eq!(ids, vec!["S0", "S1", "S2", "S3", "S4"]);
    }

    #[test]
    fn confidence_tiers() {
        let interpolator = Interpolator::default();
        assert_eq!(interpolator.confidence(4_000.0, 2), Confidence::High);
        assert_eq!(interpolator.confidence(4_000.0, 1), Confidence::Medium);
        assert_eq!(interpolator.confidence(12_000.0, 3), Confidence::Medium);
        assert_eq!(interpolator.confidence(20_000.0, 3), Confidence::Low);
    }

    #[test]
    fn point_confidence_is_the_weakest() {
        let snapshot = snapshot(&[
            ("a", 52.01, 5.0, &[(Pollutant::No2, 20.0), (Pollutant::O3, 50.0)]),
            ("b", 52.02, 5.0, &[(Pollutant::No2, 22.0)]),
        ]);
        let point = Interpolator::default()
            .interpolate(52.0, 5.0, Some(&snapshot))
            .unwrap();

        assert_eq!(point.get(Pollutant::No2).unwrap().confidence, Confidence::High);
        assert_eq!(point.get(Pollutant::O3).unwrap().confidence, Confidence::Medium);
        assert_eq!(point.confidence(), Confidence::Medium);
    }

    #[test]
    fn batch_keeps_going_past_failures() {
        let snapshot = snapshot(&[("a", 52.0, 5.0, &[(Pollutant::No2, 20.0)])]);
        let results = Interpolator::default().interpolate_multiple(
            &[(52.001, 5.0), (10.0, 10.0), (95.0, 0.0), (52.002, 5.0)],
            Some(&snapshot),
        );

        assert_eq!(results.len(), 4);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_none());
        assert!(results[3].is_some());
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        let err = Interpolator::default()
            .interpolate(f64::NAN, 5.0, None)
            .unwrap_err();
        assert!(matches!(err, InterpolationError::InvalidCoordinates(_)));
    }

    proptest! {
        #[test]
        fn weights_sum_to_one(
            offsets in prop::collection::vec((-0.2f64..0.2, -0.2f64..0.2, 0.0f64..200.0), 1..8),
            qlat in -0.1f64..0.1,
            qlon in -0.1f64..0.1,
        ) {
            let ids: Vec<String> = (0..offsets.len()).map(|i| format!("S{i}")).collect();
            let values: Vec<[(Pollutant, f64); 1]> =
                offsets.iter().map(|(_, _, v)| [(Pollutant::Pm25, *v)]).collect();
            let rows: Vec<(&str, f64, f64, &[(Pollutant, f64)])> = offsets
                .iter()
                .zip(&ids)
                .zip(&values)
                .map(|(((dlat, dlon, _), id), v)| (id.as_str(), 52.0 + dlat, 5.0 + dlon, &v[..]))
                .collect();
            let snapshot = snapshot(&rows);

            let point = Interpolator::default()
                .interpolate(52.0 + qlat, 5.0 + qlon, Some(&snapshot))
                .unwrap();
            let pm25 = point.get(Pollutant::Pm25).unwrap();

            let total: f64 = pm25.contributions.iter().map(|c| c.weight).sum();
            prop_assert!((total - 1.0).abs() < 1e-3, "weights sum to {}", total);

            let lo = pm25.contributions.iter().map(|c| c.value).fold(f64::INFINITY, f64::min);
            let hi = pm25.contributions.iter().map(|c| c.value).fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(pm25.value >= lo - 1e-6 && pm25.value <= hi + 1e-6);
        }
    }
}
