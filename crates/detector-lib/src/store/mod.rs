//! Durable model storage
//!
//! The store is the single source of truth and the only authority that
//! assigns version identifiers. Identifiers are strictly increasing per
//! series, even under concurrent training calls.

mod memory;

pub use memory::MemoryStore;

use crate::error::DetectorError;
use crate::models::{ModelParams, ModelVersion, TrainingRecord, VersionSummary};
use async_trait::async_trait;

/// Store-wide counters for health reporting
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCounts {
    /// Total model versions across all series
    pub versions: u64,
    /// Series with an active version
    pub active: u64,
}

/// Transactional storage for model versions and their training records
///
/// `append` writes the version row and its training record together or not
/// at all. Status transitions happen only through `activate`, one atomic
/// unit per call: the target version becomes Active and the previously
/// active version (if any) becomes Superseded, with no observable instant
/// in between.
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Durably create the next version for a series, in Pending status
    ///
    /// The store assigns the version identifier; callers never pick one.
    async fn append(
        &self,
        series_id: &str,
        params: ModelParams,
        training: TrainingRecord,
    ) -> Result<ModelVersion, DetectorError>;

    /// Atomically make `version` the single active version of the series
    async fn activate(&self, series_id: &str, version: u64) -> Result<(), DetectorError>;

    /// Load the active version; `NotFound` if none was ever activated
    async fn load_active(&self, series_id: &str) -> Result<ModelVersion, DetectorError>;

    /// Load a specific version, including superseded ones
    async fn load_version(
        &self,
        series_id: &str,
        version: u64,
    ) -> Result<ModelVersion, DetectorError>;

    /// Version summaries for a series, ascending by version
    async fn list_versions(&self, series_id: &str) -> Result<Vec<VersionSummary>, DetectorError>;

    /// The raw points behind a version, for audit and visualization
    async fn training_record(
        &self,
        series_id: &str,
        version: u64,
    ) -> Result<TrainingRecord, DetectorError>;

    /// Store-wide counters
    async fn counts(&self) -> StoreCounts;
}
