//! Model training pipeline
//!
//! Validation -> fitting -> durable append -> activation. The validator and
//! fitter are pure; all state changes go through the version manager.

mod fitter;
mod service;
mod validator;

pub use fitter::fit;
pub use service::{TrainingConfig, TrainingService};
pub use validator::{validate_batch, validate_multiplier, MIN_TRAINING_POINTS};
