use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::DashboardConfig;
use crate::error::{DashboardError, Result};

/// Source of pre-aggregated analytics payloads.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch(&self, endpoint: &str) -> Result<Value>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpDataProvider {
    client: Client,
    base_url: String,
}

impl HttpDataProvider {
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let value = self.fetch("/health").await?;
        serde_json::from_value(value).map_err(|err| DashboardError::malformed("health", err))
    }
}

#[async_trait]
impl DataProvider for HttpDataProvider {
    async fn fetch(&self, endpoint: &str) -> Result<Value> {
        let url = self.url_for(endpoint);
        debug!(%url, "fetching payload");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::NetworkFailure(format!(
                "{endpoint} responded with {status}"
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| {
            DashboardError::malformed(endpoint.trim_start_matches('/'), err)
        })
    }
}
