//! The decision rule
//!
//! A point is anomalous iff its value exceeds `mean + k * std_dev`. The rule
//! is one-sided: values far below the mean are not anomalies. This is the
//! serving contract and must not be widened to the two-sided form.

use crate::models::ModelParams;

/// Apply the decision rule to a single value
///
/// Stateless and branch-free; by design the cheapest stage of the serving
/// path.
#[inline]
pub fn decide(value: f64, params: &ModelParams) -> bool {
    value > params.decision_boundary()
}
