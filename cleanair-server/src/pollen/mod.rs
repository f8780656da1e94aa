//! Pollen network: client, exposure model and flag-gated cached service.

mod client;
mod model;
mod service;
mod types;

pub use client::{PROVIDER_NAME, PollenClient, PollenConfig, PollenSource};
pub use model::{
    NEUTRAL_EXPOSURE_FACTOR, PollenForecast, PollenLevel, PollenReading, RegionalPollen, RiskLevel,
};
pub use service::{DEFAULT_POLLEN_GRID_SIZE, PollenService};
