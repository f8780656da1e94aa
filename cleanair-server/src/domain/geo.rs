//! Geographic coordinates, great-circle distance and grid quantization.

use std::fmt;

use serde::Serialize;

/// Mean earth radius used for haversine distances, in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Error returned when constructing an out-of-range coordinate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid coordinate: {reason}")]
pub struct InvalidCoordinate {
    reason: &'static str,
}

/// A validated WGS84 latitude/longitude pair in degrees.
///
/// Latitude is always within [-90, 90] and longitude within [-180, 180].
///
/// # Examples
///
/// ```
/// use cleanair_server::domain::Coordinate;
///
/// let dam = Coordinate::new(52.3731, 4.8926).unwrap();
/// assert_eq!(dam.lat(), 52.3731);
///
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// assert!(Coordinate::new(f64::NAN, 0.0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lon: f64) -> Result<Self, InvalidCoordinate> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(InvalidCoordinate {
                reason: "latitude and longitude must be finite",
            });
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(InvalidCoordinate {
                reason: "latitude must be within [-90, 90]",
            });
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(InvalidCoordinate {
                reason: "longitude must be within [-180, 180]",
            });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Great-circle distance to `other` in metres.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
    }

    /// The grid cell of side `size_deg` degrees containing this coordinate.
    pub fn grid_cell(&self, size_deg: f64) -> GridCell {
        GridCell::containing(*self, size_deg)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lon)
    }
}

/// A square cell on a fixed-size degree grid.
///
/// Cells are addressed by `floor(lat / size)` and `floor(lon / size)`.
/// Flooring (rather than rounding) keeps every coordinate on the same side
/// of a cell boundary regardless of which neighbour it is compared with,
/// so nearby queries land on a stable key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    lat_index: i64,
    lon_index: i64,
    /// Bit pattern of the size in degrees, so the cell stays hashable.
    size_bits: u64,
}

impl GridCell {
    /// The cell containing `coordinate` on a grid of `size_deg` degrees.
    ///
    /// `size_deg` must be positive; callers validate it at configuration time.
    pub fn containing(coordinate: Coordinate, size_deg: f64) -> Self {
        debug_assert!(size_deg > 0.0, "grid size must be positive");
        Self {
            lat_index: (coordinate.lat / size_deg).floor() as i64,
            lon_index: (coordinate.lon / size_deg).floor() as i64,
            size_bits: size_deg.to_bits(),
        }
    }

    /// Cell size in degrees.
    pub fn size(&self) -> f64 {
        f64::from_bits(self.size_bits)
    }

    /// Latitude of the cell's southern edge (`floor(lat/size)*size`).
    pub fn lat(&self) -> f64 {
        self.lat_index as f64 * self.size()
    }

    /// Longitude of the cell's western edge (`floor(lon/size)*size`).
    pub fn lon(&self) -> f64 {
        self.lon_index as f64 * self.size()
    }

    /// The centre of the cell, clamped to valid coordinate ranges.
    pub fn centre(&self) -> Coordinate {
        let half = self.size() / 2.0;
        Coordinate {
            lat: (self.lat() + half).clamp(-90.0, 90.0),
            lon: (self.lon() + half).clamp(-180.0, 180.0),
        }
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}@{}", self.lat(), self.lon(), self.size())
    }
}
