//! Spatial interpolation of station measurements.

mod config;
mod idw;

pub use config::InterpolationConfig;
pub use idw::{
    Confidence, Contribution, InterpolatedPoint, InterpolatedValue, InterpolationError,
    Interpolator, NEAR_STATION_DISTANCE_M, NEAR_STATION_WEIGHT,
};
