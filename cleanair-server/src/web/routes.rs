//! HTTP route handlers.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::context::RequestContext;
use crate::domain::InvalidCoordinate;
use crate::error::ProviderError;
use crate::pollen::NEUTRAL_EXPOSURE_FACTOR;
use crate::resilience::Transport;
use crate::routing::{DirectionsResponse, RoutingError};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router<T: Transport + 'static>(state: AppState<T>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status::<T>))
        .route("/metrics", get(metrics::<T>))
        .route("/air-quality/point", get(air_quality_point::<T>))
        .route("/air-quality/stations", get(air_quality_stations::<T>))
        .route("/pollen", get(pollen::<T>))
        .route("/directions", post(directions::<T>))
        .route("/admin/cache/invalidate", post(invalidate_cache::<T>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

fn request_context<T>(state: &AppState<T>) -> RequestContext {
    RequestContext::with_timeout(state.request_timeout)
}

/// Dependency health and cache contents.
async fn status<T: Transport + 'static>(
    State(state): State<AppState<T>>,
) -> Json<StatusResponse> {
    let live: HashMap<_, _> = state.breakers.states().into_iter().collect();
    let dependencies: Vec<_> = state
        .health
        .snapshot()
        .into_iter()
        .map(|health| {
            let breaker_state = live.get(&health.name).copied();
            DependencyStatus::new(health, breaker_state)
        })
        .collect();

    let caches = CacheReport {
        air_quality: state.air_quality.cache_status().await,
        routing: state.routing.cache_stats().await,
        pollen: state.pollen.cache_stats().await,
    };

    Json(StatusResponse {
        status: overall_status(dependencies.iter().map(|d| d.status)),
        dependencies,
        caches,
        pollen_enabled: state.pollen.is_enabled(),
    })
}

/// Prometheus text exposition.
async fn metrics<T: Transport + 'static>(
    State(state): State<AppState<T>>,
) -> Result<Response, AppError> {
    let body = state.metrics.render().map_err(|e| AppError::Internal {
        message: format!("failed to render metrics: {e}"),
    })?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}

/// Interpolated air quality at a point.
///
/// Provider or interpolation failures become warnings on a 200 response;
/// only a malformed coordinate is an error.
async fn air_quality_point<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Query(query): Query<PointQuery>,
) -> Result<Json<PointResponse>, AppError> {
    let location = query.coordinate()?;
    let ctx = request_context(&state);

    let (snapshot, exposure_factor) = futures::join!(
        state.air_quality.get_snapshot(&ctx),
        state.pollen.get_exposure_factor(&ctx, location),
    );

    let mut response = PointResponse::new(location, exposure_factor);
    let snapshot = match snapshot {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            warn!(%location, error = %err, "serving point without air-quality data");
            response
                .warnings
                .push(format!("air quality data unavailable: {err}"));
            None
        }
    };

    match state.interpolator.interpolate_at(location, snapshot.as_deref()) {
        Ok(point) => response = response.with_point(point),
        Err(err) if snapshot.is_some() => {
            debug!(%location, error = %err, "interpolation produced no values");
            response.warnings.push(err.to_string());
        }
        Err(_) => {}
    }

    Ok(Json(response))
}

/// Every station in the current snapshot.
async fn air_quality_stations<T: Transport + 'static>(
    State(state): State<AppState<T>>,
) -> Result<Json<StationsResponse>, AppError> {
    let ctx = request_context(&state);
    let snapshot = state.air_quality.get_snapshot(&ctx).await?;
    Ok(Json(StationsResponse::from_snapshot(&snapshot)))
}

/// Pollen for the region around a point. The exposure factor is always set.
async fn pollen<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Query(query): Query<PointQuery>,
) -> Result<Json<PollenResponse>, AppError> {
    let location = query.coordinate()?;
    let ctx = request_context(&state);

    let mut warnings = Vec::new();
    let pollen = match state.pollen.get_regional_pollen(&ctx, location).await {
        Ok(pollen) => Some(pollen),
        Err(ProviderError::Disabled(_)) => None,
        Err(err) => {
            warn!(%location, error = %err, "pollen unavailable");
            warnings.push(format!("pollen data unavailable: {err}"));
            None
        }
    };

    let exposure_factor = pollen
        .as_ref()
        .map_or(NEUTRAL_EXPOSURE_FACTOR, |p| p.reading.exposure_factor());

    Ok(Json(PollenResponse {
        enabled: state.pollen.is_enabled(),
        exposure_factor,
        pollen: pollen.map(|p| (*p).clone()),
        warnings,
    }))
}

async fn directions<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Json(body): Json<DirectionsBody>,
) -> Result<Json<DirectionsResponse>, AppError> {
    let request = body.into_request()?;
    let ctx = request_context(&state);
    let response = state.routing.get_directions(&ctx, &request).await?;
    Ok(Json((*response).clone()))
}

async fn invalidate_cache<T: Transport + 'static>(
    State(state): State<AppState<T>>,
    Query(query): Query<InvalidateQuery>,
) -> Json<InvalidateResponse> {
    let target = query.cache;
    let wants = |cache: CacheTarget| target == CacheTarget::All || target == cache;

    let mut invalidated = Vec::new();
    if wants(CacheTarget::AirQuality) {
        state.air_quality.invalidate_cache().await;
        invalidated.push("air_quality");
    }
    if wants(CacheTarget::Routing) {
        state.routing.invalidate_cache().await;
        invalidated.push("routing");
    }
    if wants(CacheTarget::Pollen) {
        state.pollen.invalidate_cache().await;
        invalidated.push("pollen");
    }

    info!(?invalidated, "caches invalidated");
    Json(InvalidateResponse { invalidated })
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Unavailable { message: String },
    Internal { message: String },
}

impl From<InvalidCoordinate> for AppError {
    fn from(e: InvalidCoordinate) -> Self {
        AppError::BadRequest {
            message: e.to_string(),
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Disabled(_) | ProviderError::NoData { .. } => AppError::NotFound {
                message: e.to_string(),
            },
            _ => AppError::Unavailable {
                message: e.to_string(),
            },
        }
    }
}

impl From<RoutingError> for AppError {
    fn from(e: RoutingError) -> Self {
        match e {
            RoutingError::InvalidCoordinates(_) => AppError::BadRequest {
                message: e.to_string(),
            },
            RoutingError::NoRouteFound(_) => AppError::NotFound {
                message: e.to_string(),
            },
            _ => AppError::Unavailable {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Unavailable { message } => (StatusCode::SERVICE_UNAVAILABLE, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            error!(%status, %message, "request failed");
        } else {
            debug!(%status, %message, "request rejected");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
