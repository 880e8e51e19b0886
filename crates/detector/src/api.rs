//! HTTP API for training, inference, version inspection, and probes
//!
//! Routing stays thin: request parsing and status mapping only. All
//! semantics live in detector-lib.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use detector_lib::{
    ComponentStatus, DetectorError, DetectorMetrics, HealthRegistry, InferenceService,
    ModelStore, PredictOptions, SeriesPoint, TrainingBatch, TrainingService,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Shared application state
pub struct AppState {
    pub training: TrainingService,
    pub inference: InferenceService,
    pub store: Arc<dyn ModelStore>,
    pub health_registry: HealthRegistry,
    pub metrics: DetectorMetrics,
}

/// Training request payload: parallel timestamp/value arrays
#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub series_id: String,
    pub model_version: String,
    pub points_used: usize,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub timestamp: i64,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub anomaly: bool,
    pub model_version: String,
}

#[derive(Debug, Serialize)]
pub struct VersionRow {
    pub model_version: String,
    pub status: String,
    pub created_at: i64,
    pub training_points: usize,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Serialize)]
pub struct TrainingDataResponse {
    pub series_id: String,
    pub model_version: String,
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
    pub data_points_count: usize,
}

/// Error body in the `{"detail": ...}` shape clients already expect
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

enum ApiError {
    Core(DetectorError),
    BadRequest(String),
}

impl From<DetectorError> for ApiError {
    fn from(err: DetectorError) -> Self {
        Self::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            ApiError::Core(err) => {
                let status = match &err {
                    e if e.is_client_error() => StatusCode::UNPROCESSABLE_ENTITY,
                    DetectorError::NotFound { .. } => StatusCode::NOT_FOUND,
                    DetectorError::BackendUnavailable(_) | DetectorError::Timeout { .. } => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}

/// Render the wire form of a version identifier
fn format_version(version: u64) -> String {
    format!("v{version}")
}

/// Accept both `v3` and `3` as a version selector
fn parse_version(raw: &str) -> Result<u64, ApiError> {
    raw.strip_prefix('v')
        .unwrap_or(raw)
        .parse::<u64>()
        .map_err(|_| ApiError::BadRequest(format!("invalid version selector '{raw}'")))
}

async fn fit(
    State(state): State<Arc<AppState>>,
    Path(series_id): Path<String>,
    Json(request): Json<TrainRequest>,
) -> Result<Json<TrainResponse>, ApiError> {
    let batch = TrainingBatch::new(request.timestamps, request.values);
    let outcome = state
        .training
        .train(&series_id, batch, request.threshold)
        .await?;

    let counts = state.store.counts().await;
    state.metrics.set_model_versions(counts.versions as i64);

    Ok(Json(TrainResponse {
        series_id: outcome.series_id,
        model_version: format_version(outcome.version),
        points_used: outcome.points_used,
    }))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Path(series_id): Path<String>,
    Query(query): Query<PredictQuery>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let version = match query.version.as_deref() {
        Some(raw) => Some(parse_version(raw)?),
        None => None,
    };

    let prediction = state
        .inference
        .predict(
            &series_id,
            SeriesPoint {
                timestamp: request.timestamp,
                value: request.value,
            },
            PredictOptions {
                version,
                ..Default::default()
            },
        )
        .await?;

    Ok(Json(PredictResponse {
        anomaly: prediction.anomaly,
        model_version: format_version(prediction.version),
    }))
}

async fn versions(
    State(state): State<Arc<AppState>>,
    Path(series_id): Path<String>,
) -> Result<Json<Vec<VersionRow>>, ApiError> {
    let summaries = state.store.list_versions(&series_id).await?;

    Ok(Json(
        summaries
            .into_iter()
            .map(|s| VersionRow {
                model_version: format_version(s.version),
                status: format!("{:?}", s.status).to_lowercase(),
                created_at: s.created_at,
                training_points: s.training_points,
                mean: s.mean,
                std_dev: s.std_dev,
            })
            .collect(),
    ))
}

async fn training_data(
    State(state): State<Arc<AppState>>,
    Path((series_id, version)): Path<(String, String)>,
) -> Result<Json<TrainingDataResponse>, ApiError> {
    let version = parse_version(&version)?;
    let record = state.store.training_record(&series_id, version).await?;

    let data_points_count = record.values.len();
    Ok(Json(TrainingDataResponse {
        series_id,
        model_version: format_version(version),
        timestamps: record.timestamps,
        values: record.values,
        data_points_count,
    }))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let counts = state.store.counts().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let body = serde_json::json!({
        "status": health.status,
        "components": health.components,
        "metrics": {
            "total_models": counts.versions,
            "active_series": counts.active,
        },
    });

    (status_code, Json(body))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer).unwrap();

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/fit/:series_id", post(fit))
        .route("/predict/:series_id", post(predict))
        .route("/versions/:series_id", get(versions))
        .route("/training-data/:series_id/:version", get(training_data))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use detector_lib::{
        CacheConfig, InferenceConfig, MemoryStore, ModelCache, PredictionLogger,
        PredictionRecord, TrainingConfig, VersionManager,
    };
    use tower::ServiceExt;

    struct NullSink;
    impl detector_lib::PredictionSink for NullSink {
        fn persist(&mut self, _record: &PredictionRecord) -> anyhow::Result<()> {
            Ok(())
        }
    }

    async fn setup_test_app() -> (Router, Arc<AppState>) {
        let store: Arc<dyn ModelStore> = Arc::new(MemoryStore::new());
        let cache = Arc::new(ModelCache::new(CacheConfig::default()));
        let metrics = DetectorMetrics::new();
        let versions = Arc::new(VersionManager::new(store.clone(), cache.clone()));
        let logger = PredictionLogger::spawn(Box::new(NullSink), metrics.clone());

        let health_registry = HealthRegistry::new();
        health_registry
            .register(detector_lib::health::components::STORE)
            .await;
        health_registry
            .register(detector_lib::health::components::CACHE)
            .await;

        let state = Arc::new(AppState {
            training: TrainingService::new(versions, TrainingConfig::default()),
            inference: InferenceService::new(
                store.clone(),
                cache,
                logger,
                InferenceConfig::default(),
            ),
            store,
            health_registry,
            metrics,
        });
        (create_router(state.clone()), state)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn train_body() -> serde_json::Value {
        serde_json::json!({
            "timestamps": [1694336400i64, 1694336460i64, 1694336520i64, 1694336580i64],
            "values": [42.5, 43.1, 41.8, 44.2],
        })
    }

    #[tokio::test]
    async fn test_fit_then_predict() {
        let (app, _state) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(post_json("/fit/sensor_001", train_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let trained = body_json(response).await;
        assert_eq!(trained["series_id"], "sensor_001");
        assert_eq!(trained["model_version"], "v1");
        assert_eq!(trained["points_used"], 4);

        let response = app
            .clone()
            .oneshot(post_json(
                "/predict/sensor_001",
                serde_json::json!({"timestamp": 1694336640i64, "value": 55.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let prediction = body_json(response).await;
        assert_eq!(prediction["anomaly"], true);
        assert_eq!(prediction["model_version"], "v1");

        let response = app
            .oneshot(post_json(
                "/predict/sensor_001",
                serde_json::json!({"timestamp": 1694336700i64, "value": 43.0}),
            ))
            .await
            .unwrap();
        let prediction = body_json(response).await;
        assert_eq!(prediction["anomaly"], false);
    }

    #[tokio::test]
    async fn test_fit_validation_errors_are_422() {
        let (app, _state) = setup_test_app().await;

        // Mismatched shapes
        let response = app
            .clone()
            .oneshot(post_json(
                "/fit/s1",
                serde_json::json!({"timestamps": [1, 2, 3], "values": [1.0, 2.0]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("same length"));

        // Constant values
        let response = app
            .oneshot(post_json(
                "/fit/s1",
                serde_json::json!({"timestamps": [1, 2], "values": [5.0, 5.0]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_predict_unknown_series_is_404() {
        let (app, _state) = setup_test_app().await;

        let response = app
            .oneshot(post_json(
                "/predict/missing",
                serde_json::json!({"timestamp": 1, "value": 1.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_predict_pinned_version() {
        let (app, _state) = setup_test_app().await;

        app.clone()
            .oneshot(post_json("/fit/s1", train_body()))
            .await
            .unwrap();
        // Retrain with a wide batch so the active model accepts 55.0
        app.clone()
            .oneshot(post_json(
                "/fit/s1",
                serde_json::json!({
                    "timestamps": [1, 2, 3, 4],
                    "values": [30.0, 45.0, 60.0, 75.0],
                }),
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/predict/s1?version=v1",
                serde_json::json!({"timestamp": 5, "value": 55.0}),
            ))
            .await
            .unwrap();
        let pinned = body_json(response).await;
        assert_eq!(pinned["anomaly"], true);
        assert_eq!(pinned["model_version"], "v1");

        let response = app
            .oneshot(post_json(
                "/predict/s1",
                serde_json::json!({"timestamp": 5, "value": 55.0}),
            ))
            .await
            .unwrap();
        let active = body_json(response).await;
        assert_eq!(active["anomaly"], false);
        assert_eq!(active["model_version"], "v2");
    }

    #[tokio::test]
    async fn test_bad_version_selector_is_422() {
        let (app, _state) = setup_test_app().await;
        app.clone()
            .oneshot(post_json("/fit/s1", train_body()))
            .await
            .unwrap();

        let response = app
            .oneshot(post_json(
                "/predict/s1?version=latest",
                serde_json::json!({"timestamp": 1, "value": 1.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_versions_listing() {
        let (app, _state) = setup_test_app().await;

        app.clone()
            .oneshot(post_json("/fit/s1", train_body()))
            .await
            .unwrap();
        app.clone()
            .oneshot(post_json("/fit/s1", train_body()))
            .await
            .unwrap();

        let response = app.oneshot(get("/versions/s1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let rows = body_json(response).await;
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["model_version"], "v1");
        assert_eq!(rows[0]["status"], "superseded");
        assert_eq!(rows[1]["model_version"], "v2");
        assert_eq!(rows[1]["status"], "active");
    }

    #[tokio::test]
    async fn test_training_data_roundtrip() {
        let (app, _state) = setup_test_app().await;

        app.clone()
            .oneshot(post_json("/fit/s1", train_body()))
            .await
            .unwrap();

        let response = app.oneshot(get("/training-data/s1/v1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["series_id"], "s1");
        assert_eq!(body["data_points_count"], 4);
        assert_eq!(body["values"][0], 42.5);
    }

    #[tokio::test]
    async fn test_healthz_includes_store_counts() {
        let (app, _state) = setup_test_app().await;

        app.clone()
            .oneshot(post_json("/fit/s1", train_body()))
            .await
            .unwrap();

        let response = app.oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health = body_json(response).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["metrics"]["total_models"], 1);
        assert_eq!(health["metrics"]["active_series"], 1);
    }

    #[tokio::test]
    async fn test_healthz_returns_503_when_unhealthy() {
        let (app, state) = setup_test_app().await;

        state
            .health_registry
            .set_unhealthy(
                detector_lib::health::components::STORE,
                "Snapshot directory unwritable",
            )
            .await;

        let response = app.oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_readyz_gating() {
        let (app, state) = setup_test_app().await;

        let response = app.clone().oneshot(get("/readyz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.health_registry.set_ready(true).await;
        let response = app.oneshot(get("/readyz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint_returns_prometheus_format() {
        let (app, _state) = setup_test_app().await;

        app.clone()
            .oneshot(post_json("/fit/s1", train_body()))
            .await
            .unwrap();
        app.clone()
            .oneshot(post_json(
                "/predict/s1",
                serde_json::json!({"timestamp": 1, "value": 43.0}),
            ))
            .await
            .unwrap();

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let metrics_text = String::from_utf8(body.to_vec()).unwrap();

        assert!(metrics_text.contains("detector_fetch_latency_seconds"));
        assert!(metrics_text.contains("detector_decide_latency_seconds"));
        assert!(metrics_text.contains("detector_predictions_total"));
    }
}
