//! Anomaly Detection Service
//!
//! Serves per-series model training and sub-100ms anomaly inference over a
//! versioned model store with a cache-aside serving path.

use anyhow::Result;
use detector_lib::{
    health::components, CacheConfig, DetectorMetrics, HealthRegistry, InferenceConfig,
    InferenceService, JsonlSink, MemoryStore, ModelCache, ModelStore, PredictionLogger,
    PredictionSink, ServiceLogger, TracingSink, TrainingConfig, TrainingService, VersionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting anomaly-detector");

    // Load configuration
    let config = config::DetectorConfig::load()?;
    info!(api_port = config.api_port, "Service configured");

    // Store: durable snapshots when a path is configured
    let store: Arc<dyn ModelStore> = match &config.store_path {
        Some(path) => Arc::new(MemoryStore::with_snapshots(path)?),
        None => Arc::new(MemoryStore::new()),
    };

    let cache = Arc::new(ModelCache::new(CacheConfig {
        capacity: config.cache_capacity,
        ttl: Duration::from_secs(config.cache_ttl_secs),
    }));

    let metrics = DetectorMetrics::new();
    let counts = store.counts().await;
    metrics.set_model_versions(counts.versions as i64);

    // Telemetry sink: JSONL file when configured, tracing events otherwise
    let sink: Box<dyn PredictionSink> = match &config.prediction_log_path {
        Some(path) => Box::new(JsonlSink::new(path)),
        None => Box::new(TracingSink),
    };
    let prediction_logger = PredictionLogger::spawn(sink, metrics.clone());

    let versions = Arc::new(VersionManager::new(store.clone(), cache.clone()));
    let training = TrainingService::new(
        versions,
        TrainingConfig {
            default_multiplier: config.default_threshold,
        },
    );
    let inference = InferenceService::new(
        store.clone(),
        cache,
        prediction_logger,
        InferenceConfig {
            store_deadline: Duration::from_millis(config.store_timeout_ms),
        },
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::STORE).await;
    health_registry.register(components::CACHE).await;
    health_registry.register(components::TELEMETRY).await;

    let logger = ServiceLogger::new("anomaly-detector");
    logger.log_startup(SERVICE_VERSION);

    let app_state = Arc::new(api::AppState {
        training,
        inference,
        store,
        health_registry: health_registry.clone(),
        metrics,
    });

    // Mark service as ready after initialization
    health_registry.set_ready(true).await;

    // Start the API server
    let _api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
