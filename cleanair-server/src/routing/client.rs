//! OpenRouteService directions client.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::context::RequestContext;
use crate::resilience::{HttpRequest, HttpResponse, ResilientClient, Transport};

use super::error::RoutingError;
use super::model::{DirectionsRequest, DirectionsResponse, Route};
use super::types::{AlternativeRoutes, DirectionsBody, DirectionsResponseDto, ErrorEnvelope};

/// Provider name used in responses, logs, metrics and health.
pub const PROVIDER_NAME: &str = "openrouteservice";

/// Default base URL for OpenRouteService.
const DEFAULT_BASE_URL: &str = "https://api.openrouteservice.org";

/// Engine error codes that mean a point is unusable.
const INVALID_POINT_CODES: &[i64] = &[2002, 2003, 2010];

/// Engine error code for "no route between these points".
const ROUTE_NOT_FOUND_CODE: i64 = 2009;

/// Configuration for the routing client.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// API key sent in the Authorization header
    pub api_key: String,

    /// Base URL for the API
    pub base_url: String,

    /// Routes to ask for when alternatives are requested
    pub alternative_count: u32,
}

impl RoutingConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            alternative_count: 3,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// How many routes ORS should return when alternatives are requested.
    pub fn with_alternative_count(mut self, count: u32) -> Self {
        self.alternative_count = count;
        self
    }
}

/// Anything that can answer a directions request.
pub trait DirectionsSource: Send + Sync {
    fn provider_name(&self) -> &str;

    fn directions(
        &self,
        ctx: &RequestContext,
        request: &DirectionsRequest,
    ) -> impl Future<Output = Result<DirectionsResponse, RoutingError>> + Send;
}

impl<S: DirectionsSource> DirectionsSource for Arc<S> {
    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn directions(
        &self,
        ctx: &RequestContext,
        request: &DirectionsRequest,
    ) -> impl Future<Output = Result<DirectionsResponse, RoutingError>> + Send {
        (**self).directions(ctx, request)
    }
}

/// Client for the OpenRouteService directions endpoint.
pub struct RoutingClient<T> {
    client: ResilientClient<T>,
    config: RoutingConfig,
}

impl<T: Transport> RoutingClient<T> {
    pub fn new(client: ResilientClient<T>, config: RoutingConfig) -> Self {
        Self { client, config }
    }

    fn build_request(&self, request: &DirectionsRequest) -> Result<HttpRequest, RoutingError> {
        let body = DirectionsBody {
            coordinates: vec![
                [request.origin.lon(), request.origin.lat()],
                [request.destination.lon(), request.destination.lat()],
            ],
            elevation: true,
            alternative_routes: request.alternatives.then(|| AlternativeRoutes {
                target_count: self.config.alternative_count,
                share_factor: 0.6,
                weight_factor: 1.4,
            }),
        };
        let body =
            serde_json::to_value(&body).map_err(|e| RoutingError::Decode(e.to_string()))?;

        let url = format!(
            "{}/v2/directions/{}/json",
            self.config.base_url,
            request.profile.provider_path()
        );
        Ok(HttpRequest::post(url, body).with_header("Authorization", &self.config.api_key))
    }
}

/// Map a response into routes or a typed error.
fn parse_response(
    request: &DirectionsRequest,
    response: &HttpResponse,
) -> Result<DirectionsResponse, RoutingError> {
    if !response.is_success() {
        return Err(map_error_status(response));
    }

    let dto: DirectionsResponseDto = response
        .json()
        .map_err(|e| RoutingError::Decode(e.to_string()))?;

    if dto.routes.is_empty() {
        return Err(RoutingError::NoRouteFound(format!(
            "no routes from {} to {}",
            request.origin, request.destination
        )));
    }

    let routes = dto
        .routes
        .into_iter()
        .map(|r| Route {
            distance_m: r.summary.distance.unwrap_or(0.0),
            duration_s: r.summary.duration.unwrap_or(0.0),
            geometry: r.geometry.unwrap_or_default(),
            ascent_m: r.summary.ascent,
            descent_m: r.summary.descent,
        })
        .collect();

    Ok(DirectionsResponse {
        provider: PROVIDER_NAME.to_string(),
        profile: request.profile,
        routes,
    })
}

fn map_error_status(response: &HttpResponse) -> RoutingError {
    let envelope = response.json::<ErrorEnvelope>().ok();
    let message = envelope
        .as_ref()
        .map(|e| e.error.message().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| response.snippet());

    match envelope.and_then(|e| e.error.code()) {
        Some(code) if INVALID_POINT_CODES.contains(&code) => {
            return RoutingError::InvalidCoordinates(message);
        }
        Some(ROUTE_NOT_FOUND_CODE) => return RoutingError::NoRouteFound(message),
        _ => {}
    }

    match response.status {
        400 | 422 => RoutingError::InvalidCoordinates(message),
        404 => RoutingError::NoRouteFound(message),
        429 => RoutingError::RateLimited,
        401 | 403 => RoutingError::Unavailable(format!("unauthorized: {message}")),
        status => RoutingError::Unavailable(format!("status {status}: {message}")),
    }
}

impl<T: Transport> DirectionsSource for RoutingClient<T> {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn directions(
        &self,
        ctx: &RequestContext,
        request: &DirectionsRequest,
    ) -> Result<DirectionsResponse, RoutingError> {
        let http_request = self.build_request(request)?;
        let response = self.client.execute(ctx, http_request).await?;
        let result = parse_response(request, &response);

        if let Err(err) = &result {
            debug!(
                profile = %request.profile,
                status = response.status,
                error = %err,
                "directions request failed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coordinate;
    use crate::resilience::fake::{ScriptedTransport, resilient};
    use crate::resilience::{Method, RetryPolicy};
    use crate::routing::model::RoutingProfile;

    fn request() -> DirectionsRequest {
        DirectionsRequest::new(
            Coordinate::new(52.3702, 4.8952).unwrap(),
            Coordinate::new(52.3600, 4.8852).unwrap(),
            RoutingProfile::Cycling,
        )
    }

    fn client(transport: Arc<ScriptedTransport>) -> RoutingClient<Arc<ScriptedTransport>> {
        RoutingClient::new(
            resilient(PROVIDER_NAME, transport),
            RoutingConfig::new("key-123").with_base_url("http://ors"),
        )
    }

    async fn directions(status: u16, body: &str) -> Result<DirectionsResponse, RoutingError> {
        let transport = Arc::new(ScriptedTransport::always(status, body));
        client(transport)
            .directions(&RequestContext::background(), &request())
            .await
    }

    #[test]
    fn config_defaults() {
        let config = RoutingConfig::new("k");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.alternative_count, 3);
    }

    #[tokio::test]
    async fn posts_lon_lat_pairs_to_profile_path() {
        let transport = Arc::new(ScriptedTransport::always(
            200,
            r#"{"routes": [{"summary": {"distance": 1500.0, "duration": 330.0}, "geometry": "abc"}]}"#,
        ));
        let client = client(transport.clone());

        let response = client
            .directions(&RequestContext::background(), &request().with_alternatives(true))
            .await
            .unwrap();

        assert_eq!(response.provider, PROVIDER_NAME);
        assert_eq!(response.routes.len(), 1);
        assert_eq!(response.routes[0].distance_m, 1500.0);
        assert_eq!(response.routes[0].ascent_m, None);

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.url, "http://ors/v2/directions/cycling-regular/json");
        assert!(sent.headers.contains(&("Authorization".into(), "key-123".into())));
        let body = sent.body.as_ref().unwrap();
        assert_eq!(body["coordinates"][0][0], 4.8952);
        assert_eq!(body["coordinates"][0][1], 52.3702);
        assert_eq!(body["alternative_routes"]["target_count"], 3);
    }

    #[tokio::test]
    async fn bad_request_maps_to_invalid_coordinates() {
        let err = directions(400, r#"{"error": "Parameter 'coordinates' has incorrect value"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::InvalidCoordinates(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn engine_codes_take_precedence() {
        let err = directions(
            404,
            r#"{"error": {"code": 2010, "message": "Could not find routable point"}}"#,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            RoutingError::InvalidCoordinates("Could not find routable point".into())
        );

        let err = directions(400, r#"{"error": {"code": 2009, "message": "Route not found"}}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::NoRouteFound(_)));
    }

    #[tokio::test]
    async fn not_found_maps_to_no_route() {
        let err = directions(404, "").await.unwrap_err();
        assert!(matches!(err, RoutingError::NoRouteFound(_)));
    }

    #[tokio::test]
    async fn empty_route_list_is_no_route() {
        let err = directions(200, r#"{"routes": []}"#).await.unwrap_err();
        assert!(matches!(err, RoutingError::NoRouteFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_429_is_rate_limited() {
        let transport = Arc::new(ScriptedTransport::always(429, r#"{"error": "slow down"}"#));
        let client = RoutingClient::new(
            resilient(PROVIDER_NAME, transport.clone()).with_retry(RetryPolicy::default()),
            RoutingConfig::new("k"),
        );

        let err = client
            .directions(&RequestContext::background(), &request())
            .await
            .unwrap_err();

        assert_eq!(err, RoutingError::RateLimited);
        assert!(err.is_retryable());
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let err = directions(502, "bad gateway").await.unwrap_err();
        assert!(matches!(err, RoutingError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unauthorized_is_unavailable() {
        let err = directions(403, r#"{"error": "Access to this API has been disallowed"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Unavailable(m) if m.starts_with("unauthorized")));
    }
}
