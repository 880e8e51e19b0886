//! Core data models for the anomaly detection service

use serde::{Deserialize, Serialize};

/// Default threshold multiplier (the k in `mean + k * std`)
pub const DEFAULT_THRESHOLD_MULTIPLIER: f64 = 3.0;

/// A single observation of a series
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: f64,
}

/// A training batch as submitted by clients: parallel timestamp/value arrays
///
/// Transient — only the artifacts derived from it (model parameters and the
/// training record) are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingBatch {
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
}

impl TrainingBatch {
    pub fn new(timestamps: Vec<i64>, values: Vec<f64>) -> Self {
        Self { timestamps, values }
    }

    /// Number of points in the batch (length of the value array)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Numeric parameters of a trained model, the unit cached for serving
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub mean: f64,
    pub std_dev: f64,
    pub threshold_multiplier: f64,
}

impl ModelParams {
    /// The value above which a point is anomalous
    pub fn decision_boundary(&self) -> f64 {
        self.mean + self.threshold_multiplier * self.std_dev
    }
}

/// Lifecycle state of a model version
///
/// Transitions are one-way: Pending -> Active -> Superseded. A version is
/// Pending between its durable creation and its activation; at most one
/// version per series is Active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Pending,
    Active,
    Superseded,
}

/// A durable model version
///
/// Immutable once created, except for `status`, which only the store flips
/// on behalf of the version manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    pub series_id: String,
    pub version: u64,
    pub params: ModelParams,
    pub status: VersionStatus,
    pub created_at: i64,
    pub training_points: usize,
}

/// The raw points a model version was trained on, kept for audit and
/// visualization; owned 1:1 by the version that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
}

impl From<TrainingBatch> for TrainingRecord {
    fn from(batch: TrainingBatch) -> Self {
        Self {
            timestamps: batch.timestamps,
            values: batch.values,
        }
    }
}

/// Listing row for a series' version history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionSummary {
    pub version: u64,
    pub status: VersionStatus,
    pub created_at: i64,
    pub training_points: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Which model version an inference call consults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionSelector {
    /// The currently active version (the default)
    Active,
    /// A specific version, active or superseded
    Pinned(u64),
}

/// Result of an inference call
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Prediction {
    pub anomaly: bool,
    pub version: u64,
}

/// Append-only telemetry row, one per inference call
///
/// Write-only from the serving path's perspective; consumed by the external
/// monitoring tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub series_id: String,
    pub version: u64,
    pub timestamp: i64,
    pub value: f64,
    pub anomaly: bool,
    /// Time spent obtaining parameters (cache hit or store fallback)
    pub fetch_micros: u64,
    /// Time spent in the decision rule
    pub decide_micros: u64,
    pub created_at: i64,
}

/// Outcome of a successful training call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub series_id: String,
    pub version: u64,
    pub points_used: usize,
}
