//! Core library for the anomaly detection service
//!
//! This crate provides the model version lifecycle and its serving path:
//! - Training batch validation and statistical model fitting
//! - Durable, versioned model storage with per-series ordering
//! - Atomic version activation and supersession
//! - Cache-aside parameter serving with explicit invalidation
//! - Inference with per-call latency telemetry
//! - Health checks and observability

pub mod cache;
pub mod error;
pub mod health;
pub mod inference;
pub mod models;
pub mod observability;
pub mod store;
pub mod telemetry;
pub mod training;
pub mod versioning;


pub use cache::{CacheConfig, CacheStats, ModelCache};
pub use error::DetectorError;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use inference::{InferenceConfig, InferenceService, PredictOptions};
pub use models::*;
pub use observability::{DetectorMetrics, ServiceLogger};
pub use store::{MemoryStore, ModelStore, StoreCounts};
pub use telemetry::{JsonlSink, PredictionLogger, PredictionSink, TracingSink};
pub use training::{TrainingConfig, TrainingService};
pub use versioning::VersionManager;
