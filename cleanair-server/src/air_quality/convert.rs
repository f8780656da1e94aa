//! Conversion from Luchtmeetnet DTOs to domain types.
//!
//! Rows that cannot be used are skipped, never fatal: unsupported
//! pollutants, missing or non-finite values, unparseable timestamps and
//! stations without valid coordinates.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::{
    Coordinate, MICROGRAMS_PER_CUBIC_METRE, Measurement, Pollutant, Snapshot, Station,
};

use super::types::{MeasurementDto, StationDto};

/// Convert one measurement row, or `None` if it is unusable.
pub fn convert_measurement(dto: &MeasurementDto) -> Option<Measurement> {
    let pollutant = Pollutant::from_code(&dto.formula)?;
    let value = dto.value.filter(|v| v.is_finite())?;
    let measured_at = match DateTime::parse_from_rfc3339(&dto.timestamp_measured) {
        Ok(t) => t.with_timezone(&Utc),
        Err(e) => {
            debug!(
                station = %dto.station_number,
                timestamp = %dto.timestamp_measured,
                error = %e,
                "skipping measurement with bad timestamp"
            );
            return None;
        }
    };

    Some(Measurement {
        station_id: dto.station_number.clone(),
        pollutant,
        value,
        unit: MICROGRAMS_PER_CUBIC_METRE.to_string(),
        measured_at,
    })
}

fn station_location(dto: &StationDto) -> Option<Coordinate> {
    let coordinates = &dto.geometry.as_ref()?.coordinates;
    let [lon, lat] = coordinates.as_slice() else {
        return None;
    };
    Coordinate::new(*lat, *lon).ok()
}

/// Build a snapshot from raw station and measurement rows.
///
/// A station measures the pollutants it declares plus any it has a
/// measurement for. Its `last_updated` is its newest measurement time, or
/// `fetched_at` when it has none.
pub fn build_snapshot(
    provider: &str,
    fetched_at: DateTime<Utc>,
    stations: &[StationDto],
    measurements: &[MeasurementDto],
) -> Snapshot {
    let measurements: Vec<Measurement> =
        measurements.iter().filter_map(convert_measurement).collect();

    let mut measured: HashMap<&str, (BTreeSet<Pollutant>, DateTime<Utc>)> = HashMap::new();
    for m in &measurements {
        let entry = measured
            .entry(m.station_id.as_str())
            .or_insert_with(|| (BTreeSet::new(), m.measured_at));
        entry.0.insert(m.pollutant);
        entry.1 = entry.1.max(m.measured_at);
    }

    let mut skipped = 0usize;
    let mut domain_stations = Vec::with_capacity(stations.len());
    for dto in stations {
        let Some(location) = station_location(dto) else {
            skipped += 1;
            continue;
        };

        let mut pollutants: BTreeSet<Pollutant> = dto
            .components
            .iter()
            .filter_map(|code| Pollutant::from_code(code))
            .collect();
        let last_updated = match measured.get(dto.number.as_str()) {
            Some((seen, newest)) => {
                pollutants.extend(seen.iter().copied());
                *newest
            }
            None => fetched_at,
        };

        domain_stations.push(Station {
            id: dto.number.clone(),
            name: dto.location.clone().unwrap_or_else(|| dto.number.clone()),
            location,
            pollutants,
            last_updated,
        });
    }

    if skipped > 0 {
        debug!(provider, skipped, "skipped stations without coordinates");
    }

    Snapshot::new(provider, fetched_at, domain_stations, measurements)
}
