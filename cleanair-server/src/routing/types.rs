//! OpenRouteService directions DTOs.

use serde::{Deserialize, Serialize};

/// Body of `POST /v2/directions/{profile}/json`.
#[derive(Debug, Clone, Serialize)]
pub struct DirectionsBody {
    /// `[[lon, lat], [lon, lat]]`
    pub coordinates: Vec<[f64; 2]>,

    pub elevation: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_routes: Option<AlternativeRoutes>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlternativeRoutes {
    pub target_count: u32,
    pub share_factor: f64,
    pub weight_factor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsResponseDto {
    #[serde(default)]
    pub routes: Vec<RouteDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteDto {
    pub summary: SummaryDto,

    /// Encoded polyline.
    pub geometry: Option<String>,
}

/// Route totals. The engine omits distance and duration for zero-length
/// routes.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryDto {
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    pub ascent: Option<f64>,
    pub descent: Option<f64>,
}

/// Error envelope. `error` is either a string or `{code, message}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Detailed {
        code: Option<i64>,
        message: Option<String>,
    },
    Message(String),
}

impl ErrorBody {
    pub fn code(&self) -> Option<i64> {
        match self {
            ErrorBody::Detailed { code, .. } => *code,
            ErrorBody::Message(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorBody::Detailed { message, .. } => message.as_deref().unwrap_or(""),
            ErrorBody::Message(message) => message,
        }
    }
}
