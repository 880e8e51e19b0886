//! In-memory model store with optional per-series snapshot persistence
//!
//! Series state lives in a sharded map, so training calls for unrelated
//! series never contend on one lock. Each mutation rewrites that series'
//! JSON snapshot atomically (temp file + rename); a failed write rolls the
//! in-memory change back so no partial version survives.

use super::{ModelStore, StoreCounts};
use crate::error::DetectorError;
use crate::models::{
    ModelParams, ModelVersion, TrainingRecord, VersionStatus, VersionSummary,
};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One durable row: parameters plus the training record that produced them,
/// committed together
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVersion {
    params: ModelParams,
    status: VersionStatus,
    created_at: i64,
    training: TrainingRecord,
}

/// Per-series storage state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SeriesState {
    series_id: String,
    versions: BTreeMap<u64, StoredVersion>,
    active: Option<u64>,
    /// Highest identifier ever assigned; the next append gets this + 1
    last_version: u64,
}

/// In-memory `ModelStore` implementation
pub struct MemoryStore {
    series: DashMap<String, SeriesState>,
    snapshot_dir: Option<PathBuf>,
}

impl MemoryStore {
    /// Create a purely in-memory store
    pub fn new() -> Self {
        Self {
            series: DashMap::new(),
            snapshot_dir: None,
        }
    }

    /// Create a store that snapshots each series to `dir`, loading any
    /// existing snapshots first
    pub fn with_snapshots(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let store = Self {
            series: DashMap::new(),
            snapshot_dir: Some(dir.clone()),
        };

        let mut loaded = 0usize;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_snapshot(&path) {
                Ok(state) => {
                    store.series.insert(state.series_id.clone(), state);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable series snapshot");
                }
            }
        }

        if loaded > 0 {
            info!(dir = %dir.display(), series = loaded, "Loaded series snapshots");
        }
        Ok(store)
    }

    fn read_snapshot(path: &Path) -> anyhow::Result<SeriesState> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Snapshot file name for a series, safe for arbitrary series ids
    fn snapshot_path(dir: &Path, series_id: &str) -> PathBuf {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        series_id.hash(&mut hasher);
        let prefix: String = series_id
            .chars()
            .take(32)
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
            .collect();
        dir.join(format!("{}-{:016x}.json", prefix, hasher.finish()))
    }

    /// Write the series snapshot atomically
    fn persist(&self, state: &SeriesState) -> Result<(), DetectorError> {
        let Some(ref dir) = self.snapshot_dir else {
            return Ok(());
        };

        let path = Self::snapshot_path(dir, &state.series_id);
        let json = serde_json::to_vec(state)
            .map_err(|e| DetectorError::Persistence(format!("serialize snapshot: {e}")))?;

        let temp_path = path.with_extension("tmp");
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&temp_path, &path)
        };
        write().map_err(|e| {
            DetectorError::Persistence(format!("write snapshot {}: {e}", path.display()))
        })?;

        debug!(series_id = %state.series_id, path = %path.display(), "Series snapshot written");
        Ok(())
    }

    fn to_model_version(series_id: &str, version: u64, row: &StoredVersion) -> ModelVersion {
        ModelVersion {
            series_id: series_id.to_string(),
            version,
            params: row.params,
            status: row.status,
            created_at: row.created_at,
            training_points: row.training.values.len(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn append(
        &self,
        series_id: &str,
        params: ModelParams,
        training: TrainingRecord,
    ) -> Result<ModelVersion, DetectorError> {
        let mut entry = self
            .series
            .entry(series_id.to_string())
            .or_insert_with(|| SeriesState {
                series_id: series_id.to_string(),
                ..SeriesState::default()
            });

        let version = entry.last_version + 1;
        let row = StoredVersion {
            params,
            status: VersionStatus::Pending,
            created_at: chrono::Utc::now().timestamp(),
            training,
        };

        entry.last_version = version;
        entry.versions.insert(version, row);

        if let Err(e) = self.persist(&entry) {
            // Roll back so no partial row is observable
            entry.versions.remove(&version);
            entry.last_version = version - 1;
            return Err(e);
        }

        let created = Self::to_model_version(series_id, version, &entry.versions[&version]);
        debug!(series_id, version, "Model version appended");
        Ok(created)
    }

    async fn activate(&self, series_id: &str, version: u64) -> Result<(), DetectorError> {
        let mut entry = self
            .series
            .get_mut(series_id)
            .ok_or_else(|| DetectorError::NotFound {
                series_id: series_id.to_string(),
                version: Some(version),
            })?;

        if !entry.versions.contains_key(&version) {
            return Err(DetectorError::NotFound {
                series_id: series_id.to_string(),
                version: Some(version),
            });
        }

        let previous = entry.active;
        if previous == Some(version) {
            return Ok(());
        }

        // The active pointer only ever moves forward; a superseded version
        // never returns to active.
        if let Some(current) = previous {
            if version < current {
                return Err(DetectorError::Persistence(format!(
                    "stale activation: v{version} is older than active v{current} for {series_id}"
                )));
            }
        }
        if entry.versions[&version].status == VersionStatus::Superseded {
            return Err(DetectorError::Persistence(format!(
                "cannot re-activate superseded v{version} for {series_id}"
            )));
        }

        // Single atomic unit under the series lock: demote then promote
        if let Some(current) = previous {
            if let Some(row) = entry.versions.get_mut(&current) {
                row.status = VersionStatus::Superseded;
            }
        }
        if let Some(row) = entry.versions.get_mut(&version) {
            row.status = VersionStatus::Active;
        }
        entry.active = Some(version);

        if let Err(e) = self.persist(&entry) {
            // Restore the pre-transition state
            if let Some(current) = previous {
                if let Some(row) = entry.versions.get_mut(&current) {
                    row.status = VersionStatus::Active;
                }
            }
            if let Some(row) = entry.versions.get_mut(&version) {
                row.status = VersionStatus::Pending;
            }
            entry.active = previous;
            return Err(e);
        }

        debug!(series_id, version, previous = ?previous, "Model version activated");
        Ok(())
    }

    async fn load_active(&self, series_id: &str) -> Result<ModelVersion, DetectorError> {
        let entry = self
            .series
            .get(series_id)
            .ok_or_else(|| DetectorError::NotFound {
                series_id: series_id.to_string(),
                version: None,
            })?;

        let active = entry.active.ok_or_else(|| DetectorError::NotFound {
            series_id: series_id.to_string(),
            version: None,
        })?;

        entry
            .versions
            .get(&active)
            .map(|row| Self::to_model_version(series_id, active, row))
            .ok_or_else(|| DetectorError::NotFound {
                series_id: series_id.to_string(),
                version: Some(active),
            })
    }

    async fn load_version(
        &self,
        series_id: &str,
        version: u64,
    ) -> Result<ModelVersion, DetectorError> {
        let entry = self
            .series
            .get(series_id)
            .ok_or_else(|| DetectorError::NotFound {
                series_id: series_id.to_string(),
                version: Some(version),
            })?;

        entry
            .versions
            .get(&version)
            .map(|row| Self::to_model_version(series_id, version, row))
            .ok_or_else(|| DetectorError::NotFound {
                series_id: series_id.to_string(),
                version: Some(version),
            })
    }

    async fn list_versions(&self, series_id: &str) -> Result<Vec<VersionSummary>, DetectorError> {
        let entry = self
            .series
            .get(series_id)
            .ok_or_else(|| DetectorError::NotFound {
                series_id: series_id.to_string(),
                version: None,
            })?;

        // BTreeMap iteration is ascending by version
        Ok(entry
            .versions
            .iter()
            .map(|(version, row)| VersionSummary {
                version: *version,
                status: row.status,
                created_at: row.created_at,
                training_points: row.training.values.len(),
                mean: row.params.mean,
                std_dev: row.params.std_dev,
            })
            .collect())
    }

    async fn training_record(
        &self,
        series_id: &str,
        version: u64,
    ) -> Result<TrainingRecord, DetectorError> {
        let entry = self
            .series
            .get(series_id)
            .ok_or_else(|| DetectorError::NotFound {
                series_id: series_id.to_string(),
                version: Some(version),
            })?;

        entry
            .versions
            .get(&version)
            .map(|row| row.training.clone())
            .ok_or_else(|| DetectorError::NotFound {
                series_id: series_id.to_string(),
                version: Some(version),
            })
    }

    async fn counts(&self) -> StoreCounts {
        let mut counts = StoreCounts::default();
        for entry in self.series.iter() {
            counts.versions += entry.versions.len() as u64;
            if entry.active.is_some() {
                counts.active += 1;
            }
        }
        counts
    }
}
