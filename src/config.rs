use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::DEFAULT_HIGH_PRIORITY_THRESHOLD;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api_base_url: String,
    /// Amounts above this are flagged HIGH priority.
    pub high_priority_threshold: BigDecimal,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub default_page_limit: usize,
    pub export_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            api_base_url: env::var("REVIEW_API_BASE_URL")?,
            high_priority_threshold: env::var("REVIEW_HIGH_PRIORITY_THRESHOLD")
                .unwrap_or_else(|_| DEFAULT_HIGH_PRIORITY_THRESHOLD.to_string())
                .parse()?,
            poll_interval_secs: env::var("REVIEW_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            request_timeout_secs: env::var("REVIEW_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            default_page_limit: env::var("REVIEW_DEFAULT_PAGE_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            export_dir: env::var("REVIEW_EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir()),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
