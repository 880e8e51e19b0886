//! Anomaly Detection Service CLI
//!
//! A command-line tool for training per-series models, requesting verdicts,
//! and inspecting version history on a running detection service.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::ApiClient;

/// Anomaly Detection Service CLI
#[derive(Parser)]
#[command(name = "adc")]
#[command(author, version, about = "CLI for the Anomaly Detection Service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via ADC_API_URL env var)
    #[arg(long, env = "ADC_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a new model version from a points file
    Train {
        /// Series identifier
        series_id: String,

        /// JSON file with {"timestamps": [...], "values": [...]}
        #[arg(long)]
        file: std::path::PathBuf,

        /// Threshold multiplier (defaults to the service's setting)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Request an anomaly verdict for a single point
    Predict {
        /// Series identifier
        series_id: String,

        /// Value to classify
        value: f64,

        /// Unix timestamp of the point (defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,

        /// Pin a specific model version, e.g. v1
        #[arg(long)]
        version: Option<String>,
    },

    /// List the version history of a series
    Versions {
        /// Series identifier
        series_id: String,
    },

    /// Show the raw training points behind a version
    Data {
        /// Series identifier
        series_id: String,

        /// Model version, e.g. v1
        version: String,
    },

    /// Show service health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Train {
            series_id,
            file,
            threshold,
        } => commands::train::run(&client, &series_id, &file, threshold).await,
        Commands::Predict {
            series_id,
            value,
            timestamp,
            version,
        } => {
            commands::predict::run(
                &client,
                &series_id,
                value,
                timestamp,
                version.as_deref(),
                cli.format,
            )
            .await
        }
        Commands::Versions { series_id } => {
            commands::versions::run(&client, &series_id, cli.format).await
        }
        Commands::Data { series_id, version } => {
            commands::versions::run_data(&client, &series_id, &version, cli.format).await
        }
        Commands::Health => commands::health::run(&client).await,
    }
}
