//! Versions and training-data commands

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

#[derive(Tabled, Serialize)]
struct VersionTableRow {
    #[tabled(rename = "VERSION")]
    version: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "POINTS")]
    points: usize,
    #[tabled(rename = "MEAN")]
    mean: String,
    #[tabled(rename = "STD DEV")]
    std_dev: String,
    #[tabled(rename = "CREATED AT")]
    created_at: i64,
}

pub async fn run(client: &ApiClient, series_id: &str, format: OutputFormat) -> Result<()> {
    let versions = client.versions(series_id).await?;

    let rows: Vec<VersionTableRow> = versions
        .into_iter()
        .map(|v| VersionTableRow {
            version: v.model_version,
            status: v.status,
            points: v.training_points,
            mean: format!("{:.4}", v.mean),
            std_dev: format!("{:.4}", v.std_dev),
            created_at: v.created_at,
        })
        .collect();

    output::print_table(&rows, format);
    Ok(())
}

#[derive(Tabled, Serialize)]
struct PointRow {
    #[tabled(rename = "TIMESTAMP")]
    timestamp: i64,
    #[tabled(rename = "VALUE")]
    value: f64,
}

pub async fn run_data(
    client: &ApiClient,
    series_id: &str,
    version: &str,
    format: OutputFormat,
) -> Result<()> {
    let data = client.training_data(series_id, version).await?;

    let rows: Vec<PointRow> = data
        .timestamps
        .iter()
        .zip(data.values.iter())
        .map(|(timestamp, value)| PointRow {
            timestamp: *timestamp,
            value: *value,
        })
        .collect();

    output::print_info(&format!(
        "{} {} ({} points)",
        data.series_id, data.model_version, data.data_points_count
    ));
    output::print_table(&rows, format);
    Ok(())
}
