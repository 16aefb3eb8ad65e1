//! Debug API Server
//!
//! HTTP API for submitting batches by hand and checking liveness.

use crate::application::{BatchOptions, GeocodingService};
use crate::domain::entities::{BatchOutcome, BatchStats, GeoInput, GeoResult};
use crate::domain::ports::ResolutionCache;
use crate::infrastructure::shutdown::ShutdownController;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Batch submission.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeRequest {
    pub items: Vec<GeoInput>,
    /// Overrides the configured batch deadline
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// Batch response, echoing the submitted items.
#[derive(Debug, Serialize)]
pub struct GeocodeResponse {
    pub input: Vec<GeoInput>,
    pub result: Vec<GeoResult>,
    pub success: bool,
    pub message: String,
    pub failed: usize,
    pub stats: BatchStats,
}

impl GeocodeResponse {
    fn new(input: Vec<GeoInput>, outcome: BatchOutcome) -> Self {
        let success = outcome.success();
        let message = if input.is_empty() {
            "no postcodes submitted".to_string()
        } else if success {
            format!(
                "geocoded {} of {} postcodes",
                outcome.results.len(),
                input.len()
            )
        } else {
            "no postcodes could be geocoded".to_string()
        };

        Self {
            input,
            result: outcome.results,
            success,
            message,
            failed: outcome.failed,
            stats: outcome.stats,
        }
    }
}

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cached_postcodes: usize,
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<GeocodingService>,
    pub shutdown: ShutdownController,
}

impl ApiState {
    pub fn new(service: Arc<GeocodingService>, shutdown: ShutdownController) -> Self {
        Self { service, shutdown }
    }
}

/// Build the API routes.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/debug/geocode", post(geocode_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Debug API server.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(listen_addr: String, state: ApiState) -> Self {
        Self { listen_addr, state }
    }

    /// Run the API server until the shutdown controller fires.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("geocoding API listening on {}", self.listen_addr);

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;
        Ok(())
    }
}

// Handler functions

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_postcodes: state.service.cache().len().await,
    };
    Json(response)
}

async fn geocode_handler(
    State(state): State<ApiState>,
    Json(req): Json<GeocodeRequest>,
) -> Response {
    if state.shutdown.is_shutdown() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "error": "shutting down"
            })),
        )
            .into_response();
    }

    if req.deadline_ms == Some(0) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({
                "error": "deadline_ms must be positive"
            })),
        )
            .into_response();
    }

    let _guard = state.shutdown.batch_guard();
    let options = BatchOptions {
        deadline: req.deadline_ms.map(Duration::from_millis),
    };

    let outcome = state
        .service
        .geocode_batch_with(&req.items, options)
        .await;

    tracing::debug!(
        "debug batch: {} submitted, {} resolved",
        req.items.len(),
        outcome.results.len()
    );

    Json(GeocodeResponse::new(req.items, outcome)).into_response()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::adapters::outbound::DashMapResolutionCache;
    use crate::application::EngineConfig;
    use crate::domain::entities::Coordinate;
    use crate::domain::error::GeocodeError;
    use crate::domain::ports::GeocodeProvider;
    use crate::domain::value_objects::{normalize, NormalizedKey};
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode as HttpStatusCode},
    };
    use http_body_util::BodyExt;
    use std::collections::HashMap;
    use tower::ServiceExt;

    /// Knows exactly one postcode.
    struct StubProvider {
        known: HashMap<String, Coordinate>,
    }

    impl StubProvider {
        fn palace() -> Self {
            let mut known = HashMap::new();
            known.insert("SW1A 1AA".to_string(), Coordinate::new(51.5014, -0.1419));
            Self { known }
        }
    }

    #[async_trait]
    impl GeocodeProvider for StubProvider {
        async fn resolve(&self, key: &NormalizedKey) -> Result<Coordinate, GeocodeError> {
            self.known
                .get(key.as_str())
                .copied()
                .ok_or_else(|| GeocodeError::ProviderRejected(key.to_string()))
        }
    }

    fn create_test_state() -> ApiState {
        let service = GeocodingService::new(
            Arc::new(StubProvider::palace()),
            Arc::new(DashMapResolutionCache::new()),
            EngineConfig::default(),
        )
        .unwrap();
        ApiState::new(Arc::new(service), ShutdownController::new())
    }

    fn geocode_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/debug/geocode")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    // ===== Response Tests =====

    #[test]
    fn test_response_message_variants() {
        let empty = GeocodeResponse::new(vec![], BatchOutcome::default());
        assert!(!empty.success);
        assert_eq!(empty.message, "no postcodes submitted");

        let none = GeocodeResponse::new(
            vec![GeoInput::new("", 1.0)],
            BatchOutcome::new(
                vec![],
                BatchStats {
                    invalid: 1,
                    ..Default::default()
                },
            ),
        );
        assert!(!none.success);
        assert_eq!(none.failed, 1);
        assert_eq!(none.message, "no postcodes could be geocoded");
    }

    #[test]
    fn test_request_deadline_optional() {
        let req: GeocodeRequest =
            serde_json::from_str(r#"{"items":[{"postcode":"SW1A 1AA","value":1.0}]}"#).unwrap();
        assert_eq!(req.items.len(), 1);
        assert!(req.deadline_ms.is_none());
    }

    // ===== Handler Tests =====

    #[tokio::test]
    async fn test_health_handler() {
        let state = create_test_state();
        state
            .service
            .cache()
            .put(&normalize("M1 1AE").unwrap(), Coordinate::new(53.4, -2.2))
            .await;
        let app = router(state);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), HttpStatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(json["cached_postcodes"], 1);
    }

    #[tokio::test]
    async fn test_geocode_handler_success() {
        let app = router(create_test_state());

        let response = app
            .oneshot(geocode_request(serde_json::json!({
                "items": [{"postcode": "SW1A 1AA", "value": 1000}]
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), HttpStatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["failed"], 0);
        assert_eq!(json["input"][0]["postcode"], "SW1A 1AA");
        assert_eq!(json["result"][0]["postcode"], "SW1A 1AA");
        assert_eq!(json["result"][0]["latitude"], 51.5014);
        assert_eq!(json["result"][0]["longitude"], -0.1419);
        assert_eq!(json["result"][0]["value"], 1000.0);
        assert_eq!(json["message"], "geocoded 1 of 1 postcodes");
    }

    #[tokio::test]
    async fn test_geocode_handler_empty_postcode() {
        let app = router(create_test_state());

        let response = app
            .oneshot(geocode_request(serde_json::json!({
                "items": [{"postcode": "", "value": 1000}]
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), HttpStatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["result"], serde_json::json!([]));
        assert_eq!(json["failed"], 1);
        assert_eq!(json["stats"]["invalid"], 1);
    }

    #[tokio::test]
    async fn test_geocode_handler_partial() {
        let app = router(create_test_state());

        let response = app
            .oneshot(geocode_request(serde_json::json!({
                "items": [
                    {"postcode": "ZZ9 9ZZ", "value": 1},
                    {"postcode": "sw1a1aa", "value": 2},
                    {"postcode": "???", "value": 3}
                ],
                "deadline_ms": 5000
            })))
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["result"].as_array().unwrap().len(), 1);
        assert_eq!(json["result"][0]["postcode"], "sw1a1aa");
        assert_eq!(json["failed"], 2);
        assert_eq!(json["stats"]["rejected"], 1);
        assert_eq!(json["stats"]["invalid"], 1);
    }

    #[tokio::test]
    async fn test_geocode_handler_zero_deadline() {
        let app = router(create_test_state());

        let response = app
            .oneshot(geocode_request(serde_json::json!({
                "items": [{"postcode": "SW1A 1AA", "value": 1}],
                "deadline_ms": 0
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), HttpStatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_geocode_handler_malformed_body() {
        let app = router(create_test_state());

        let request = Request::builder()
            .method("POST")
            .uri("/debug/geocode")
            .header("content-type", "application/json")
            .body(Body::from("{\"items\": 42}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_geocode_handler_refused_during_shutdown() {
        let state = create_test_state();
        state.shutdown.shutdown();
        let app = router(state);

        let response = app
            .oneshot(geocode_request(serde_json::json!({
                "items": [{"postcode": "SW1A 1AA", "value": 1}]
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), HttpStatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_geocode_handler_releases_batch_guard() {
        let state = create_test_state();
        let shutdown = state.shutdown.clone();
        let app = router(state);

        app.oneshot(geocode_request(serde_json::json!({
            "items": [{"postcode": "SW1A 1AA", "value": 1}]
        })))
        .await
        .unwrap();

        assert_eq!(shutdown.active_batches(), 0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = router(create_test_state());

        let request = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), HttpStatusCode::NOT_FOUND);
    }
}
