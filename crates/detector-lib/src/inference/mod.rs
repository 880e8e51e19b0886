//! Inference serving path

mod engine;
mod service;

pub use engine::decide;
pub use service::{InferenceConfig, InferenceService, PredictOptions};
