//! Domain types for the provider data core.
//!
//! Coordinates and pollutants are validated at construction, so code that
//! receives these types can trust their ranges.

mod air_quality;
mod geo;
mod pollutant;

pub use air_quality::{Measurement, Snapshot, Station};
pub use geo::{Coordinate, EARTH_RADIUS_M, GridCell, InvalidCoordinate};
pub use pollutant::{MICROGRAMS_PER_CUBIC_METRE, Pollutant};
