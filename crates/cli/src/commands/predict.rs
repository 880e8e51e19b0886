//! Predict command: classify one point against the active or a pinned model

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use std::time::{SystemTime, UNIX_EPOCH};

pub async fn run(
    client: &ApiClient,
    series_id: &str,
    value: f64,
    timestamp: Option<i64>,
    version: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let timestamp = timestamp.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    });

    let result = client.predict(series_id, timestamp, value, version).await?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "anomaly": result.anomaly,
                    "model_version": result.model_version,
                })
            );
        }
        OutputFormat::Table => {
            output::print_info(&format!(
                "{} value {} -> {} ({})",
                series_id,
                value,
                output::format_verdict(result.anomaly),
                result.model_version
            ));
        }
    }
    Ok(())
}
