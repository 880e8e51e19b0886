//! Train command: submit a points file as a new model version

use crate::client::{ApiClient, TrainPayload};
use crate::output;
use anyhow::{Context, Result};
use std::path::Path;

pub async fn run(
    client: &ApiClient,
    series_id: &str,
    file: &Path,
    threshold: Option<f64>,
) -> Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read points file {:?}", file))?;
    let mut payload: TrainPayload =
        serde_json::from_str(&data).context("Points file must contain timestamps and values arrays")?;
    payload.threshold = threshold.or(payload.threshold);

    let result = client.train(series_id, &payload).await?;

    output::print_success(&format!(
        "Trained {} {} from {} points",
        result.series_id, result.model_version, result.points_used
    ));
    Ok(())
}
