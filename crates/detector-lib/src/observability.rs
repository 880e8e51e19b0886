//! Observability infrastructure for the detection service
//!
//! Provides:
//! - Prometheus metrics (per-stage inference latency, training activity,
//!   cache effectiveness)
//! - Structured logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

struct DetectorMetricsInner {
    fetch_latency_seconds: Histogram,
    decide_latency_seconds: Histogram,
    telemetry_persist_latency_seconds: Histogram,
    predictions_total: IntCounter,
    anomalies_total: IntCounter,
    cache_hits_total: IntCounter,
    cache_misses_total: IntCounter,
    store_fallback_total: IntCounter,
    training_runs_total: IntCounter,
    training_errors_total: IntCounter,
    dropped_records_total: IntCounter,
    model_versions: IntGauge,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            fetch_latency_seconds: register_histogram!(
                "detector_fetch_latency_seconds",
                "Time spent obtaining model parameters (cache hit or store fallback)",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fetch_latency_seconds"),

            decide_latency_seconds: register_histogram!(
                "detector_decide_latency_seconds",
                "Time spent applying the decision rule",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register decide_latency_seconds"),

            telemetry_persist_latency_seconds: register_histogram!(
                "detector_telemetry_persist_latency_seconds",
                "Time spent persisting a prediction record",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register telemetry_persist_latency_seconds"),

            predictions_total: register_int_counter!(
                "detector_predictions_total",
                "Total number of inference calls served"
            )
            .expect("Failed to register predictions_total"),

            anomalies_total: register_int_counter!(
                "detector_anomalies_total",
                "Total number of anomalous verdicts"
            )
            .expect("Failed to register anomalies_total"),

            cache_hits_total: register_int_counter!(
                "detector_cache_hits_total",
                "Parameter lookups answered from the cache"
            )
            .expect("Failed to register cache_hits_total"),

            cache_misses_total: register_int_counter!(
                "detector_cache_misses_total",
                "Parameter lookups that fell back to the store"
            )
            .expect("Failed to register cache_misses_total"),

            store_fallback_total: register_int_counter!(
                "detector_store_fallback_total",
                "Store loads performed on the serving path"
            )
            .expect("Failed to register store_fallback_total"),

            training_runs_total: register_int_counter!(
                "detector_training_runs_total",
                "Total number of successful training calls"
            )
            .expect("Failed to register training_runs_total"),

            training_errors_total: register_int_counter!(
                "detector_training_errors_total",
                "Total number of failed training calls"
            )
            .expect("Failed to register training_errors_total"),

            dropped_records_total: register_int_counter!(
                "detector_dropped_records_total",
                "Prediction records dropped by the telemetry queue"
            )
            .expect("Failed to register dropped_records_total"),

            model_versions: register_int_gauge!(
                "detector_model_versions",
                "Model versions currently in the store"
            )
            .expect("Failed to register model_versions"),
        }
    }
}

/// Detector metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct DetectorMetrics {
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_fetch_latency(&self, duration_secs: f64) {
        self.inner().fetch_latency_seconds.observe(duration_secs);
    }

    pub fn observe_decide_latency(&self, duration_secs: f64) {
        self.inner().decide_latency_seconds.observe(duration_secs);
    }

    pub fn observe_persist_latency(&self, duration_secs: f64) {
        self.inner()
            .telemetry_persist_latency_seconds
            .observe(duration_secs);
    }

    pub fn inc_predictions(&self, anomaly: bool) {
        self.inner().predictions_total.inc();
        if anomaly {
            self.inner().anomalies_total.inc();
        }
    }

    pub fn inc_cache_hit(&self) {
        self.inner().cache_hits_total.inc();
    }

    pub fn inc_cache_miss(&self) {
        self.inner().cache_misses_total.inc();
        self.inner().store_fallback_total.inc();
    }

    pub fn inc_training_run(&self) {
        self.inner().training_runs_total.inc();
    }

    pub fn inc_training_error(&self) {
        self.inner().training_errors_total.inc();
    }

    pub fn inc_dropped_record(&self) {
        self.inner().dropped_records_total.inc();
    }

    pub fn set_model_versions(&self, count: i64) {
        self.inner().model_versions.set(count);
    }
}

/// Structured logger for service events
///
/// Emits consistent named-field events for training, activation, and
/// prediction activity.
#[derive(Clone)]
pub struct ServiceLogger {
    service_name: String,
}

impl ServiceLogger {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    /// Log a completed training call
    pub fn log_training(&self, series_id: &str, version: u64, points_used: usize, elapsed_ms: f64) {
        info!(
            event = "model_trained",
            service = %self.service_name,
            series_id = %series_id,
            version = version,
            points_used = points_used,
            elapsed_ms = elapsed_ms,
            "Trained and activated model version"
        );
    }

    /// Log a failed training call
    pub fn log_training_failure(&self, series_id: &str, error: &str) {
        warn!(
            event = "training_failed",
            service = %self.service_name,
            series_id = %series_id,
            error = %error,
            "Training call failed"
        );
    }

    /// Log an inference verdict with its latency breakdown
    pub fn log_prediction(
        &self,
        series_id: &str,
        version: u64,
        anomaly: bool,
        fetch_micros: u64,
        decide_micros: u64,
    ) {
        info!(
            event = "prediction",
            service = %self.service_name,
            series_id = %series_id,
            version = version,
            anomaly = anomaly,
            fetch_micros = fetch_micros,
            decide_micros = decide_micros,
            "Prediction served"
        );
    }

    /// Log service startup
    pub fn log_startup(&self, version: &str) {
        info!(
            event = "service_started",
            service = %self.service_name,
            service_version = %version,
            "Anomaly detection service started"
        );
    }

    /// Log service shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service_name,
            reason = %reason,
            "Anomaly detection service shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_metrics_creation() {
        // Metrics register against the global Prometheus registry once per
        // process; this exercises the handle surface.
        let metrics = DetectorMetrics::new();

        metrics.observe_fetch_latency(0.001);
        metrics.observe_decide_latency(0.00001);
        metrics.observe_persist_latency(0.002);
        metrics.inc_predictions(true);
        metrics.inc_predictions(false);
        metrics.inc_cache_hit();
        metrics.inc_cache_miss();
        metrics.inc_training_run();
        metrics.set_model_versions(3);
    }

    #[test]
    fn test_service_logger_creation() {
        let logger = ServiceLogger::new("detector-test");
        assert_eq!(logger.service_name, "detector-test");
    }
}
