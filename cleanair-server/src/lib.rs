//! Provider data core for a clean-air routing service.
//!
//! Fetches air-quality measurements, routes and pollen from external
//! providers behind retries, circuit breakers and stale-if-error caches,
//! and interpolates pollutant levels between monitoring stations.

pub mod air_quality;
pub mod cache;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod flags;
pub mod interpolate;
pub mod metrics;
pub mod pollen;
pub mod resilience;
pub mod routing;
pub mod web;
