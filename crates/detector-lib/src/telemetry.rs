//! Prediction telemetry pipeline
//!
//! Inference hands each `PredictionRecord` to a bounded queue drained by a
//! background writer. The serving path never waits on the writer: a full
//! queue drops the record (at-most-once, best-effort) and a sink failure is
//! logged and swallowed. Verdicts always return to the caller independently
//! of telemetry durability.

use crate::models::PredictionRecord;
use crate::observability::DetectorMetrics;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default bound on queued records
const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Destination for prediction records
pub trait PredictionSink: Send + 'static {
    fn persist(&mut self, record: &PredictionRecord) -> anyhow::Result<()>;
}

/// Appends records as JSON lines to a file, created lazily on first write
pub struct JsonlSink {
    path: PathBuf,
    file: Option<File>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }
}

impl PredictionSink for JsonlSink {
    fn persist(&mut self, record: &PredictionRecord) -> anyhow::Result<()> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.file = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            );
        }

        let file = self.file.as_mut().expect("file opened above");
        serde_json::to_writer(&mut *file, record)?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

/// Emits each record as a structured tracing event only
pub struct TracingSink;

impl PredictionSink for TracingSink {
    fn persist(&mut self, record: &PredictionRecord) -> anyhow::Result<()> {
        info!(
            event = "prediction_record",
            series_id = %record.series_id,
            version = record.version,
            timestamp = record.timestamp,
            value = record.value,
            anomaly = record.anomaly,
            fetch_micros = record.fetch_micros,
            decide_micros = record.decide_micros,
            "Prediction logged"
        );
        Ok(())
    }
}

/// Non-blocking front end of the telemetry pipeline
#[derive(Clone)]
pub struct PredictionLogger {
    tx: mpsc::Sender<PredictionRecord>,
    metrics: DetectorMetrics,
}

impl PredictionLogger {
    /// Start the writer task draining into `sink`
    pub fn spawn(sink: Box<dyn PredictionSink>, metrics: DetectorMetrics) -> Self {
        Self::spawn_with_queue(sink, DEFAULT_QUEUE_SIZE, metrics)
    }

    pub fn spawn_with_queue(
        mut sink: Box<dyn PredictionSink>,
        queue_size: usize,
        metrics: DetectorMetrics,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<PredictionRecord>(queue_size.max(1));

        let writer_metrics = metrics.clone();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                let start = Instant::now();
                match sink.persist(&record) {
                    Ok(()) => {
                        writer_metrics.observe_persist_latency(start.elapsed().as_secs_f64());
                    }
                    Err(e) => {
                        // Best-effort: the record is lost, the serving path
                        // already returned
                        warn!(
                            series_id = %record.series_id,
                            error = %e,
                            "Failed to persist prediction record"
                        );
                    }
                }
            }
            debug!("Prediction writer stopped");
        });

        Self { tx, metrics }
    }

    /// Enqueue a record without blocking; drops it when the queue is full or
    /// the writer is gone
    pub fn record(&self, record: PredictionRecord) {
        if let Err(e) = self.tx.try_send(record) {
            self.metrics.inc_dropped_record();
            warn!(error = %e, "Dropping prediction record");
        }
    }
}
