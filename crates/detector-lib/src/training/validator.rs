//! Training batch validation
//!
//! Rules are checked in order and the first failure wins. No side effects.

use crate::error::DetectorError;
use crate::models::TrainingBatch;

/// Minimum points required to fit a model
pub const MIN_TRAINING_POINTS: usize = 2;

/// Relative tolerance below which a batch counts as constant
const CONSTANT_TOLERANCE: f64 = 1e-12;

/// Validate a training batch, rejecting malformed or statistically
/// degenerate input before any state change
///
/// Checked in order: array shape, minimum length, finite values,
/// non-constant values.
pub fn validate_batch(batch: &TrainingBatch) -> Result<(), DetectorError> {
    if batch.timestamps.len() != batch.values.len() {
        return Err(DetectorError::ShapeMismatch {
            timestamps: batch.timestamps.len(),
            values: batch.values.len(),
        });
    }

    if batch.len() < MIN_TRAINING_POINTS {
        return Err(DetectorError::InsufficientData {
            got: batch.len(),
            min: MIN_TRAINING_POINTS,
        });
    }

    for (index, value) in batch.values.iter().enumerate() {
        if !value.is_finite() {
            return Err(DetectorError::InvalidValue { index });
        }
    }

    if is_constant(&batch.values) {
        return Err(DetectorError::ConstantSeries);
    }

    Ok(())
}

/// Validate the threshold multiplier supplied with a training request
pub fn validate_multiplier(multiplier: f64) -> Result<(), DetectorError> {
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(DetectorError::InvalidThreshold { value: multiplier });
    }
    Ok(())
}

/// True when every value is identical within floating tolerance, which would
/// make the sample standard deviation zero
fn is_constant(values: &[f64]) -> bool {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(*v);
        max = max.max(*v);
    }
    let scale = min.abs().max(max.abs()).max(1.0);
    (max - min) <= CONSTANT_TOLERANCE * scale
}
