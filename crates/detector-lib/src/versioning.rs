//! Model version activation
//!
//! The version manager owns the one-active-version-per-series invariant. It
//! serializes append+activate pairs for a series behind a per-series lock
//! (no global lock across series) and invalidates the cache strictly after
//! the durable activation commits.

use crate::cache::ModelCache;
use crate::error::DetectorError;
use crate::models::{ModelParams, ModelVersion, TrainingRecord, VersionStatus};
use crate::store::ModelStore;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Coordinates version creation and activation against the store and cache
pub struct VersionManager {
    store: Arc<dyn ModelStore>,
    cache: Arc<ModelCache>,
    /// Per-series critical sections for append+activate ordering
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl VersionManager {
    pub fn new(store: Arc<dyn ModelStore>, cache: Arc<ModelCache>) -> Self {
        Self {
            store,
            cache,
            locks: DashMap::new(),
        }
    }

    fn series_lock(&self, series_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(series_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append a new version and make it active, as one serialized step
    ///
    /// This is the training flow's commit point. Two concurrent commits for
    /// the same series serialize here, so the store assigns strictly
    /// increasing versions and activation order matches version order.
    /// Readers are never blocked: inference may observe the old active
    /// version until the activation commits, never a half-applied state.
    pub async fn commit(
        &self,
        series_id: &str,
        params: ModelParams,
        training: TrainingRecord,
    ) -> Result<ModelVersion, DetectorError> {
        let lock = self.series_lock(series_id);
        let _guard = lock.lock().await;

        let created = self.store.append(series_id, params, training).await?;
        self.store.activate(series_id, created.version).await?;

        // Invalidation only after the durable activation commit returned
        self.cache.invalidate_active(series_id);

        info!(
            series_id,
            version = created.version,
            mean = params.mean,
            std_dev = params.std_dev,
            "Model version activated"
        );

        Ok(ModelVersion {
            status: VersionStatus::Active,
            ..created
        })
    }

    /// Activate an existing version of a series
    ///
    /// Same ordering contract as `commit`: the cache entry for the active
    /// selector is dropped only after the store transition commits.
    pub async fn activate(&self, series_id: &str, version: u64) -> Result<(), DetectorError> {
        let lock = self.series_lock(series_id);
        let _guard = lock.lock().await;

        self.store.activate(series_id, version).await?;
        self.cache.invalidate_active(series_id);

        info!(series_id, version, "Model version activated");
        Ok(())
    }
}
