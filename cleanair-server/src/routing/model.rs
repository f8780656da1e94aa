//! Routing domain types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Coordinate, GridCell};

/// How the route will be travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingProfile {
    Cycling,
    #[serde(rename = "ebike")]
    EBike,
    Walking,
    Driving,
}

impl RoutingProfile {
    /// Path segment the routing engine uses for this profile.
    pub fn provider_path(&self) -> &'static str {
        match self {
            RoutingProfile::Cycling => "cycling-regular",
            RoutingProfile::EBike => "cycling-electric",
            RoutingProfile::Walking => "foot-walking",
            RoutingProfile::Driving => "driving-car",
        }
    }
}

impl fmt::Display for RoutingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoutingProfile::Cycling => "cycling",
            RoutingProfile::EBike => "ebike",
            RoutingProfile::Walking => "walking",
            RoutingProfile::Driving => "driving",
        };
        f.write_str(s)
    }
}

/// A request for directions between two points.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub profile: RoutingProfile,
    /// Ask for alternative routes as well as the best one.
    pub alternatives: bool,
}

impl DirectionsRequest {
    pub fn new(origin: Coordinate, destination: Coordinate, profile: RoutingProfile) -> Self {
        Self {
            origin,
            destination,
            profile,
            alternatives: false,
        }
    }

    pub fn with_alternatives(mut self, alternatives: bool) -> Self {
        self.alternatives = alternatives;
        self
    }
}

/// One route option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub distance_m: f64,
    pub duration_s: f64,
    /// Encoded polyline, passed through untouched.
    pub geometry: String,
    pub ascent_m: Option<f64>,
    pub descent_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectionsResponse {
    pub provider: String,
    pub profile: RoutingProfile,
    pub routes: Vec<Route>,
}

/// Cache key: both endpoints snapped to the grid, plus the options that
/// change the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub origin: GridCell,
    pub destination: GridCell,
    pub profile: RoutingProfile,
    pub alternatives: bool,
}

impl RouteKey {
    pub fn for_request(request: &DirectionsRequest, grid_size: f64) -> Self {
        Self {
            origin: request.origin.grid_cell(grid_size),
            destination: request.destination.grid_cell(grid_size),
            profile: request.profile,
            alternatives: request.alternatives,
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}/{}", self.origin, self.destination, self.profile)?;
        if self.alternatives {
            f.write_str("+alt")?;
        }
        Ok(())
    }
}
