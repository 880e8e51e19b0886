//! Service configuration

use anyhow::Result;
use serde::Deserialize;

/// Detector service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Maximum entries in the parameter cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Cache entry time-to-live in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Deadline for store access on the serving path, in milliseconds
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// Directory for series snapshots; in-memory only when unset
    #[serde(default)]
    pub store_path: Option<String>,

    /// JSON-lines prediction log; tracing-only telemetry when unset
    #[serde(default)]
    pub prediction_log_path: Option<String>,

    /// Threshold multiplier applied when a training request omits one
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
}

fn default_api_port() -> u16 {
    8080
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_store_timeout() -> u64 {
    250
}

fn default_threshold() -> f64 {
    3.0
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl(),
            store_timeout_ms: default_store_timeout(),
            store_path: None,
            prediction_log_path: None,
            default_threshold: default_threshold(),
        }
    }
}

impl DetectorConfig {
    /// Load configuration from DETECTOR_-prefixed environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("DETECTOR"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}
