use super::issue_service::IssueService;
use crate::config::CollectorConfig;
use crate::error::{AppError, AppResult};
use crate::models::Round;
use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Polls the draw-result provider and hands payloads to the issue service
pub struct DrawCollector {
    url: String,
    http: Client,
    issues: Arc<IssueService>,
}

/// Append a millisecond cache-buster so intermediaries never serve a stale draw
pub fn cache_busted_url(url: &str, millis: i64) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}_={}", url, separator, millis)
}

impl DrawCollector {
    pub fn new(config: &CollectorConfig, issues: Arc<IssueService>) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url.clone(),
            http,
            issues,
        })
    }

    /// Fetch the provider's latest draw as raw JSON
    pub async fn fetch_latest(&self) -> AppResult<Value> {
        let url = cache_busted_url(&self.url, Utc::now().timestamp_millis());
        debug!("Polling draw provider: {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Draw provider request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Draw provider returned {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AppError::ExternalService(format!("Draw provider sent invalid JSON: {}", e)))
    }

    /// Fetch once and ingest; `None` when the payload was unusable
    pub async fn poll_once(&self) -> AppResult<Option<Round>> {
        let payload = self.fetch_latest().await?;
        self.issues.ingest_draw(&payload).await
    }
}
