//! Interpolation configuration.

/// Parameters for inverse-distance-weighted interpolation.
#[derive(Debug, Clone)]
pub struct InterpolationConfig {
    /// Stations farther than this (metres) are ignored.
    pub max_distance_m: f64,

    /// Fewer stations than this in range is an error.
    pub min_stations: usize,

    /// Only the nearest this many stations are used.
    pub max_stations: usize,

    /// Distance exponent in the `1 / d^power` weight.
    pub power: f64,

    /// Nearest station within this distance (metres), with at least two
    /// contributors, gives high confidence.
    pub high_confidence_m: f64,

    /// Nearest station within this distance (metres) gives medium confidence.
    pub medium_confidence_m: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            max_distance_m: 50_000.0,
            min_stations: 1,
            max_stations: 5,
            power: 2.0,
            high_confidence_m: 5_000.0,
            medium_confidence_m: 15_000.0,
        }
    }
}

impl InterpolationConfig {
    pub fn with_max_distance(mut self, metres: f64) -> Self {
        self.max_distance_m = metres;
        self
    }

    /// `min` is raised to at least 1 and `max` to at least `min`.
    pub fn with_station_limits(mut self, min: usize, max: usize) -> Self {
        self.min_stations = min.max(1);
        self.max_stations = max.max(self.min_stations);
        self
    }

    /// Non-positive or non-finite exponents are ignored.
    pub fn with_power(mut self, power: f64) -> Self {
        if power.is_finite() && power > 0.0 {
            self.power = power;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = InterpolationConfig::default();
        assert_eq!(config.max_distance_m, 50_000.0);
        assert_eq!(config.min_stations, 1);
        assert_eq!(config.max_stations, 5);
        assert_eq!(config.power, 2.0);
    }

    #[test]
    fn power_must_be_positive() {
        let config = InterpolationConfig::default().with_power(3.0);
        assert_eq!(config.power, 3.0);
        assert_eq!(config.with_power(0.0).with_power(f64::NAN).power, 3.0);
    }

    #[test]
    fn station_limits_are_consistent() {
        let config = InterpolationConfig::default().with_station_limits(0, 0);
        assert_eq!(config.min_stations, 1);
        assert_eq!(config.max_stations, 1);

        let config = InterpolationConfig::default().with_station_limits(3, 2);
        assert_eq!(config.max_stations, 3);
    }
}
