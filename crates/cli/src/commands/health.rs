//! Health command: show the service health payload

use crate::client::ApiClient;
use anyhow::Result;

pub async fn run(client: &ApiClient) -> Result<()> {
    let health = client.health().await?;
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}
