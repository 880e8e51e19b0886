//! Error taxonomy for the detection core
//!
//! Client-input errors (batch shape, degenerate statistics) are reported
//! synchronously and cause no state change. Store failures fail the in-flight
//! call; the core never retries internally.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the detection core
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Training batch arrays differ in length
    #[error("timestamps and values must have the same length ({timestamps} vs {values})")]
    ShapeMismatch { timestamps: usize, values: usize },

    /// Too few points to fit a model
    #[error("at least {min} data points required for training, got {got}")]
    InsufficientData { got: usize, min: usize },

    /// A batch value is NaN or infinite
    #[error("non-finite value at index {index}")]
    InvalidValue { index: usize },

    /// All batch values identical within floating tolerance
    #[error("constant values detected - standard deviation would be zero")]
    ConstantSeries,

    /// Threshold multiplier is non-positive or non-finite
    #[error("threshold multiplier must be a positive finite number, got {value}")]
    InvalidThreshold { value: f64 },

    /// No such series or version
    #[error("no model found for series {series_id}{}", .version.map(|v| format!(" version v{v}")).unwrap_or_default())]
    NotFound {
        series_id: String,
        version: Option<u64>,
    },

    /// Durable write failed; no partial version is left active
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Transient backend failure on the inference fallback path
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Caller deadline exceeded on a store access
    #[error("store access exceeded deadline of {waited:?}")]
    Timeout { waited: Duration },
}

impl DetectorError {
    /// True for errors caused by the client's input rather than the backend
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DetectorError::ShapeMismatch { .. }
                | DetectorError::InsufficientData { .. }
                | DetectorError::InvalidValue { .. }
                | DetectorError::ConstantSeries
                | DetectorError::InvalidThreshold { .. }
        )
    }
}
