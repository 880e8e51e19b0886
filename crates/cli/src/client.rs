//! API client for the anomaly detection service

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Client for the detection service API
pub struct ApiClient {
    client: Client,
    base_url: String,
}

/// Training request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainPayload {
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainResult {
    pub series_id: String,
    pub model_version: String,
    pub points_used: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictResult {
    pub anomaly: bool,
    pub model_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionRow {
    pub model_version: String,
    pub status: String,
    pub created_at: i64,
    pub training_points: usize,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingData {
    pub series_id: String,
    pub model_version: String,
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
    pub data_points_count: usize,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["detail"].as_str().map(str::to_string))
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, detail);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Train a new model version for a series
    pub async fn train(&self, series_id: &str, payload: &TrainPayload) -> Result<TrainResult> {
        self.post(&format!("/fit/{series_id}"), payload).await
    }

    /// Classify a single point; pass `version` to pin an old model
    pub async fn predict(
        &self,
        series_id: &str,
        timestamp: i64,
        value: f64,
        version: Option<&str>,
    ) -> Result<PredictResult> {
        let path = match version {
            Some(v) => format!("/predict/{series_id}?version={v}"),
            None => format!("/predict/{series_id}"),
        };
        self.post(
            &path,
            &serde_json::json!({"timestamp": timestamp, "value": value}),
        )
        .await
    }

    /// List all model versions of a series
    pub async fn versions(&self, series_id: &str) -> Result<Vec<VersionRow>> {
        self.get(&format!("/versions/{series_id}")).await
    }

    /// Fetch the raw training points behind a version
    pub async fn training_data(&self, series_id: &str, version: &str) -> Result<TrainingData> {
        self.get(&format!("/training-data/{series_id}/{version}"))
            .await
    }

    /// Fetch the service health payload
    pub async fn health(&self) -> Result<serde_json::Value> {
        self.get("/healthz").await
    }
}
