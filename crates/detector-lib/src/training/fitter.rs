//! Statistical model fitting
//!
//! Pure function from a validated batch to model parameters. Population
//! statistics over the whole batch; no windowing, no outlier removal.

use crate::models::{ModelParams, TrainingBatch};

/// Fit model parameters from a training batch
///
/// Uses a two-pass computation (mean first, then squared deviations) so
/// batches with large means do not lose precision to the sum-of-squares
/// shortcut. The batch is trusted after validation; callers must run
/// `validate_batch` first.
pub fn fit(batch: &TrainingBatch, threshold_multiplier: f64) -> ModelParams {
    let n = batch.values.len() as f64;

    let mean = batch.values.iter().sum::<f64>() / n;

    // Population variance (divide by n)
    let variance = batch
        .values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n;

    ModelParams {
        mean,
        std_dev: variance.sqrt(),
        threshold_multiplier,
    }
}
