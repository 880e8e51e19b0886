//! Inference orchestration
//!
//! Cache-aside lookup of model parameters, the decision rule, and
//! fire-and-forget telemetry. Store access on the miss path runs under the
//! caller's deadline; a store failure there surfaces as `BackendUnavailable`
//! rather than a stale or default verdict.

use super::engine;
use crate::cache::ModelCache;
use crate::error::DetectorError;
use crate::models::{ModelParams, Prediction, PredictionRecord, SeriesPoint, VersionSelector};
use crate::observability::DetectorMetrics;
use crate::store::ModelStore;
use crate::telemetry::PredictionLogger;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default deadline for store access on the serving path
const DEFAULT_STORE_DEADLINE: Duration = Duration::from_millis(250);

/// Inference configuration
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Deadline applied to store loads when the caller does not supply one
    pub store_deadline: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            store_deadline: DEFAULT_STORE_DEADLINE,
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictOptions {
    /// Pin a specific version instead of the active one
    pub version: Option<u64>,
    /// Caller-specified store deadline
    pub deadline: Option<Duration>,
}

/// The serving path: cache -> store fallback -> decide -> telemetry
pub struct InferenceService {
    store: Arc<dyn ModelStore>,
    cache: Arc<ModelCache>,
    logger: PredictionLogger,
    metrics: DetectorMetrics,
    config: InferenceConfig,
}

impl InferenceService {
    pub fn new(
        store: Arc<dyn ModelStore>,
        cache: Arc<ModelCache>,
        logger: PredictionLogger,
        config: InferenceConfig,
    ) -> Self {
        Self {
            store,
            cache,
            logger,
            metrics: DetectorMetrics::new(),
            config,
        }
    }

    /// Classify one point against the selected model version
    pub async fn predict(
        &self,
        series_id: &str,
        point: SeriesPoint,
        opts: PredictOptions,
    ) -> Result<Prediction, DetectorError> {
        let selector = opts
            .version
            .map(VersionSelector::Pinned)
            .unwrap_or(VersionSelector::Active);

        let fetch_start = Instant::now();
        let (version, params) = self.fetch_params(series_id, selector, opts).await?;
        let fetch_elapsed = fetch_start.elapsed();
        self.metrics.observe_fetch_latency(fetch_elapsed.as_secs_f64());

        let decide_start = Instant::now();
        let anomaly = engine::decide(point.value, &params);
        let decide_elapsed = decide_start.elapsed();
        self.metrics.observe_decide_latency(decide_elapsed.as_secs_f64());
        self.metrics.inc_predictions(anomaly);

        // Fire-and-forget: the verdict returns regardless of telemetry
        self.logger.record(PredictionRecord {
            series_id: series_id.to_string(),
            version,
            timestamp: point.timestamp,
            value: point.value,
            anomaly,
            fetch_micros: fetch_elapsed.as_micros() as u64,
            decide_micros: decide_elapsed.as_micros() as u64,
            created_at: chrono::Utc::now().timestamp(),
        });

        debug!(
            series_id,
            version,
            anomaly,
            fetch_micros = fetch_elapsed.as_micros() as u64,
            "Prediction served"
        );

        Ok(Prediction { anomaly, version })
    }

    /// Cache-aside parameter fetch with store fallback under deadline
    async fn fetch_params(
        &self,
        series_id: &str,
        selector: VersionSelector,
        opts: PredictOptions,
    ) -> Result<(u64, ModelParams), DetectorError> {
        if let Some(found) = self.cache.get(series_id, selector) {
            self.metrics.inc_cache_hit();
            return Ok(found);
        }
        self.metrics.inc_cache_miss();

        let deadline = opts.deadline.unwrap_or(self.config.store_deadline);
        let load = async {
            match selector {
                VersionSelector::Active => self.store.load_active(series_id).await,
                VersionSelector::Pinned(version) => {
                    self.store.load_version(series_id, version).await
                }
            }
        };

        let loaded = tokio::time::timeout(deadline, load)
            .await
            .map_err(|_| DetectorError::Timeout { waited: deadline })?
            .map_err(|e| match e {
                // Missing series/version is the caller's problem, not the
                // backend's
                DetectorError::NotFound { .. } => e,
                DetectorError::BackendUnavailable(_) | DetectorError::Timeout { .. } => e,
                other => DetectorError::BackendUnavailable(other.to_string()),
            })?;

        self.cache
            .put(series_id, selector, loaded.version, loaded.params);

        Ok((loaded.version, loaded.params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::models::{ModelParams, TrainingRecord};
    use crate::store::MemoryStore;
    use crate::telemetry::{PredictionLogger, PredictionSink};
    use async_trait::async_trait;

    struct NullSink;
    impl PredictionSink for NullSink {
        fn persist(&mut self, _record: &PredictionRecord) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn service_over(store: Arc<dyn ModelStore>) -> (InferenceService, Arc<ModelCache>) {
        let cache = Arc::new(ModelCache::new(CacheConfig::default()));
        let logger = PredictionLogger::spawn(Box::new(NullSink), DetectorMetrics::new());
        (
            InferenceService::new(store, cache.clone(), logger, InferenceConfig::default()),
            cache,
        )
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let params = ModelParams {
            mean: 42.9,
            std_dev: 0.8803,
            threshold_multiplier: 3.0,
        };
        let training = TrainingRecord {
            timestamps: vec![0, 60, 120, 180],
            values: vec![42.5, 43.1, 41.8, 44.2],
        };
        store.append("sensor_001", params, training).await.unwrap();
        store.activate("sensor_001", 1).await.unwrap();
        store
    }

    fn point(value: f64) -> SeriesPoint {
        SeriesPoint {
            timestamp: 1694336580,
            value,
        }
    }

    #[tokio::test]
    async fn test_predict_active_version() {
        let store = seeded_store().await;
        let (service, _cache) = service_over(store);

        let anomalous = service
            .predict("sensor_001", point(55.0), PredictOptions::default())
            .await
            .unwrap();
        assert!(anomalous.anomaly);
        assert_eq!(anomalous.version, 1);

        let normal = service
            .predict("sensor_001", point(43.0), PredictOptions::default())
            .await
            .unwrap();
        assert!(!normal.anomaly);
    }

    #[tokio::test]
    async fn test_miss_populates_cache() {
        let store = seeded_store().await;
        let (service, cache) = service_over(store);

        assert!(cache.get("sensor_001", VersionSelector::Active).is_none());
        service
            .predict("sensor_001", point(43.0), PredictOptions::default())
            .await
            .unwrap();

        // Second call is a pure cache hit
        let before = cache.stats().hits;
        service
            .predict("sensor_001", point(43.0), PredictOptions::default())
            .await
            .unwrap();
        assert_eq!(cache.stats().hits, before + 1);
    }

    #[tokio::test]
    async fn test_unknown_series_is_not_found() {
        let (service, _cache) = service_over(Arc::new(MemoryStore::new()));

        let result = service
            .predict("missing", point(1.0), PredictOptions::default())
            .await;
        assert!(matches!(result, Err(DetectorError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_pinned_version_reads_superseded() {
        let store = seeded_store().await;
        let looser = ModelParams {
            mean: 42.9,
            std_dev: 10.0,
            threshold_multiplier: 3.0,
        };
        store
            .append(
                "sensor_001",
                looser,
                TrainingRecord {
                    timestamps: vec![0, 60],
                    values: vec![30.0, 55.0],
                },
            )
            .await
            .unwrap();
        store.activate("sensor_001", 2).await.unwrap();

        let (service, _cache) = service_over(store);

        // 55.0 is anomalous under v1 but within bounds under the active v2
        let pinned = service
            .predict(
                "sensor_001",
                point(55.0),
                PredictOptions {
                    version: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(pinned.anomaly);
        assert_eq!(pinned.version, 1);

        let active = service
            .predict("sensor_001", point(55.0), PredictOptions::default())
            .await
            .unwrap();
        assert!(!active.anomaly);
        assert_eq!(active.version, 2);
    }

    #[tokio::test]
    async fn test_pinned_unknown_version_is_not_found() {
        let store = seeded_store().await;
        let (service, _cache) = service_over(store);

        let result = service
            .predict(
                "sensor_001",
                point(1.0),
                PredictOptions {
                    version: Some(42),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(DetectorError::NotFound {
                version: Some(42),
                ..
            })
        ));
    }

    /// A store whose reads hang, for deadline coverage
    struct HangingStore;

    #[async_trait]
    impl ModelStore for HangingStore {
        async fn append(
            &self,
            _series_id: &str,
            _params: ModelParams,
            _training: TrainingRecord,
        ) -> Result<crate::models::ModelVersion, DetectorError> {
            unimplemented!("write path unused")
        }

        async fn activate(&self, _series_id: &str, _version: u64) -> Result<(), DetectorError> {
            unimplemented!("write path unused")
        }

        async fn load_active(
            &self,
            _series_id: &str,
        ) -> Result<crate::models::ModelVersion, DetectorError> {
            std::future::pending().await
        }

        async fn load_version(
            &self,
            _series_id: &str,
            _version: u64,
        ) -> Result<crate::models::ModelVersion, DetectorError> {
            std::future::pending().await
        }

        async fn list_versions(
            &self,
            _series_id: &str,
        ) -> Result<Vec<crate::models::VersionSummary>, DetectorError> {
            Ok(Vec::new())
        }

        async fn training_record(
            &self,
            _series_id: &str,
            _version: u64,
        ) -> Result<TrainingRecord, DetectorError> {
            unimplemented!("unused")
        }

        async fn counts(&self) -> crate::store::StoreCounts {
            crate::store::StoreCounts::default()
        }
    }

    #[tokio::test]
    async fn test_store_deadline_maps_to_timeout() {
        let (service, _cache) = service_over(Arc::new(HangingStore));

        let result = service
            .predict(
                "s1",
                point(1.0),
                PredictOptions {
                    deadline: Some(Duration::from_millis(20)),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DetectorError::Timeout { .. })));
    }

    /// A store whose reads fail, for fallback error mapping
    struct BrokenStore;

    #[async_trait]
    impl ModelStore for BrokenStore {
        async fn append(
            &self,
            _series_id: &str,
            _params: ModelParams,
            _training: TrainingRecord,
        ) -> Result<crate::models::ModelVersion, DetectorError> {
            unimplemented!("write path unused")
        }

        async fn activate(&self, _series_id: &str, _version: u64) -> Result<(), DetectorError> {
            unimplemented!("write path unused")
        }

        async fn load_active(
            &self,
            _series_id: &str,
        ) -> Result<crate::models::ModelVersion, DetectorError> {
            Err(DetectorError::Persistence("connection reset".to_string()))
        }

        async fn load_version(
            &self,
            _series_id: &str,
            _version: u64,
        ) -> Result<crate::models::ModelVersion, DetectorError> {
            Err(DetectorError::Persistence("connection reset".to_string()))
        }

        async fn list_versions(
            &self,
            _series_id: &str,
        ) -> Result<Vec<crate::models::VersionSummary>, DetectorError> {
            Ok(Vec::new())
        }

        async fn training_record(
            &self,
            _series_id: &str,
            _version: u64,
        ) -> Result<TrainingRecord, DetectorError> {
            unimplemented!("unused")
        }

        async fn counts(&self) -> crate::store::StoreCounts {
            crate::store::StoreCounts::default()
        }
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_backend_unavailable() {
        let (service, _cache) = service_over(Arc::new(BrokenStore));

        let result = service
            .predict("s1", point(1.0), PredictOptions::default())
            .await;
        assert!(matches!(
            result,
            Err(DetectorError::BackendUnavailable(_))
        ));
    }
}
