use std::time::Duration;

use anyhow::Context;

use crate::metrics::DEFAULT_LOSS_TOP_N;
use crate::view_state::DEFAULT_PAGE_SIZE;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub page_size: usize,
    pub revenue_loss_top_n: usize,
    pub request_timeout: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            revenue_loss_top_n: DEFAULT_LOSS_TOP_N,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("CHURNLYTICS_API_URL") {
            config.api_base_url = url;
        }
        if let Some(value) = lookup("CHURNLYTICS_PAGE_SIZE") {
            config.page_size = value
                .parse()
                .with_context(|| format!("CHURNLYTICS_PAGE_SIZE must be a count, got `{value}`"))?;
        }
        if let Some(value) = lookup("CHURNLYTICS_TOP_N") {
            config.revenue_loss_top_n = value
                .parse()
                .with_context(|| format!("CHURNLYTICS_TOP_N must be a count, got `{value}`"))?;
        }
        if let Some(value) = lookup("CHURNLYTICS_TIMEOUT_SECS") {
            let secs: u64 = value.parse().with_context(|| {
                format!("CHURNLYTICS_TIMEOUT_SECS must be whole seconds, got `{value}`")
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
