//! Air-quality measurement network: client, conversion and cached service.

mod client;
mod convert;
mod service;
mod types;

pub use client::{AirQualityClient, AirQualityConfig, PROVIDER_NAME, SnapshotSource};
pub use convert::{build_snapshot, convert_measurement};
pub use service::{AirQualityService, CacheStatus};
pub use types::{GeometryDto, MeasurementDto, Page, Pagination, StationDto};
