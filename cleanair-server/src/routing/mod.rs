//! Turn-by-turn routing: OpenRouteService client and grid-keyed cache.

mod client;
mod error;
mod model;
mod service;
mod types;

pub use client::{DirectionsSource, PROVIDER_NAME, RoutingClient, RoutingConfig};
pub use error::RoutingError;
pub use model::{DirectionsRequest, DirectionsResponse, Route, RouteKey, RoutingProfile};
pub use service::{DEFAULT_ROUTE_GRID_SIZE, RoutingService};
