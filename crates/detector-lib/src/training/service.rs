//! Training orchestration
//!
//! Validate the batch, fit parameters, then hand both to the version
//! manager, which appends and activates under the per-series lock. A
//! validation failure changes no state.

use super::{fitter, validator};
use crate::error::DetectorError;
use crate::models::{TrainOutcome, TrainingBatch, TrainingRecord, DEFAULT_THRESHOLD_MULTIPLIER};
use crate::observability::{DetectorMetrics, ServiceLogger};
use crate::versioning::VersionManager;
use std::sync::Arc;
use std::time::Instant;

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Multiplier applied when the request does not carry one
    pub default_multiplier: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            default_multiplier: DEFAULT_THRESHOLD_MULTIPLIER,
        }
    }
}

/// The training flow: Validator -> Fitter -> VersionManager
pub struct TrainingService {
    versions: Arc<VersionManager>,
    metrics: DetectorMetrics,
    logger: ServiceLogger,
    config: TrainingConfig,
}

impl TrainingService {
    pub fn new(versions: Arc<VersionManager>, config: TrainingConfig) -> Self {
        Self {
            versions,
            metrics: DetectorMetrics::new(),
            logger: ServiceLogger::new("training"),
            config,
        }
    }

    /// Train a new model version for a series and make it active
    pub async fn train(
        &self,
        series_id: &str,
        batch: TrainingBatch,
        multiplier: Option<f64>,
    ) -> Result<TrainOutcome, DetectorError> {
        let result = self.train_inner(series_id, batch, multiplier).await;

        match &result {
            Ok(_) => self.metrics.inc_training_run(),
            Err(e) => {
                self.metrics.inc_training_error();
                self.logger.log_training_failure(series_id, &e.to_string());
            }
        }

        result
    }

    async fn train_inner(
        &self,
        series_id: &str,
        batch: TrainingBatch,
        multiplier: Option<f64>,
    ) -> Result<TrainOutcome, DetectorError> {
        let start = Instant::now();

        let multiplier = multiplier.unwrap_or(self.config.default_multiplier);
        validator::validate_batch(&batch)?;
        validator::validate_multiplier(multiplier)?;

        let params = fitter::fit(&batch, multiplier);
        let points_used = batch.len();

        let committed = self
            .versions
            .commit(series_id, params, TrainingRecord::from(batch))
            .await?;

        self.logger.log_training(
            series_id,
            committed.version,
            points_used,
            start.elapsed().as_secs_f64() * 1000.0,
        );

        Ok(TrainOutcome {
            series_id: series_id.to_string(),
            version: committed.version,
            points_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, ModelCache};
    use crate::models::VersionStatus;
    use crate::store::{MemoryStore, ModelStore};

    fn service() -> (TrainingService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(ModelCache::new(CacheConfig::default()));
        let versions = Arc::new(VersionManager::new(store.clone(), cache));
        (
            TrainingService::new(versions, TrainingConfig::default()),
            store,
        )
    }

    fn batch(values: &[f64]) -> TrainingBatch {
        let timestamps = (0..values.len() as i64).map(|i| i * 60).collect();
        TrainingBatch::new(timestamps, values.to_vec())
    }

    #[tokio::test]
    async fn test_train_creates_active_version() {
        let (service, store) = service();

        let outcome = service
            .train("sensor_001", batch(&[42.5, 43.1, 41.8, 44.2]), None)
            .await
            .unwrap();

        assert_eq!(outcome.version, 1);
        assert_eq!(outcome.points_used, 4);

        let active = store.load_active("sensor_001").await.unwrap();
        assert_eq!(active.status, VersionStatus::Active);
        assert!((active.params.mean - 42.9).abs() < 1e-9);
        assert!(active.params.std_dev > 0.0);
        assert_eq!(active.params.threshold_multiplier, 3.0);
    }

    #[tokio::test]
    async fn test_train_stores_training_record() {
        let (service, store) = service();

        service
            .train("s1", batch(&[1.0, 2.0, 3.0]), None)
            .await
            .unwrap();

        let record = store.training_record("s1", 1).await.unwrap();
        assert_eq!(record.values, vec![1.0, 2.0, 3.0]);
        assert_eq!(record.timestamps, vec![0, 60, 120]);
    }

    #[tokio::test]
    async fn test_retrain_supersedes() {
        let (service, store) = service();

        service.train("s1", batch(&[1.0, 2.0]), None).await.unwrap();
        let second = service.train("s1", batch(&[3.0, 4.0]), None).await.unwrap();

        assert_eq!(second.version, 2);
        assert_eq!(store.load_active("s1").await.unwrap().version, 2);
        assert_eq!(
            store.load_version("s1", 1).await.unwrap().status,
            VersionStatus::Superseded
        );
    }

    #[tokio::test]
    async fn test_invalid_batch_changes_no_state() {
        let (service, store) = service();

        let result = service.train("s1", batch(&[5.0, 5.0]), None).await;
        assert!(matches!(result, Err(DetectorError::ConstantSeries)));

        assert!(store.load_active("s1").await.is_err());
        assert_eq!(store.counts().await.versions, 0);
    }

    #[tokio::test]
    async fn test_custom_multiplier_applied() {
        let (service, store) = service();

        service
            .train("s1", batch(&[1.0, 2.0, 3.0]), Some(2.0))
            .await
            .unwrap();

        let active = store.load_active("s1").await.unwrap();
        assert_eq!(active.params.threshold_multiplier, 2.0);
    }

    #[tokio::test]
    async fn test_invalid_multiplier_rejected() {
        let (service, _store) = service();

        let result = service.train("s1", batch(&[1.0, 2.0]), Some(-1.0)).await;
        assert!(matches!(
            result,
            Err(DetectorError::InvalidThreshold { .. })
        ));
    }
}
