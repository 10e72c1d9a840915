use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{extract_list, EntitySource};
use crate::config::ApiConfig;
use crate::error::{ScrapeDashError, ScrapeDashResult};

/// HTTP client for the scraping service's JSON API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create new API client
    pub fn new(config: &ApiConfig) -> ScrapeDashResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ScrapeDashError::config(format!("Invalid API base_url {}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ScrapeDashError::config(format!("API base_url {} cannot hold paths", base_url)));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &config.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| ScrapeDashError::config("API key contains invalid header characters"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()
            .map_err(|e| ScrapeDashError::network(format!("Failed to build HTTP client: {}", e)))?;

        info!("API client initialized for {}", base_url);

        Ok(Self { client, base_url })
    }

    /// Base URL with `segments` appended, each one percent-encoded
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, segments: &[&str]) -> ScrapeDashResult<(StatusCode, reqwest::Response)> {
        let url = self.endpoint(segments);
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ScrapeDashError::network(format!("{}: {}", url, e)))?;

        Ok((response.status(), response))
    }

    async fn get_json(&self, segments: &[&str]) -> ScrapeDashResult<Value> {
        let (status, response) = self.get(segments).await?;
        if !status.is_success() {
            return Err(ScrapeDashError::HttpRequest {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ScrapeDashError::network(format!("Invalid JSON body: {}", e)))
    }

    async fn get_list(&self, segments: &[&str]) -> ScrapeDashResult<Vec<Value>> {
        let items = extract_list(self.get_json(segments).await?);
        debug!("Fetched {} records from /{}", items.len(), segments.join("/"));
        Ok(items)
    }
}

#[async_trait]
impl EntitySource for ApiClient {
    async fn list_jobs(&self) -> ScrapeDashResult<Vec<Value>> {
        self.get_list(&["jobs"]).await
    }

    async fn list_ai_jobs(&self) -> ScrapeDashResult<Vec<Value>> {
        self.get_list(&["ai-jobs"]).await
    }

    async fn get_job(&self, job_id: &str) -> ScrapeDashResult<Value> {
        self.get_json(&["jobs", job_id]).await
    }

    async fn list_emails(&self, job_id: &str) -> ScrapeDashResult<Vec<Value>> {
        self.get_list(&["jobs", job_id, "emails"]).await
    }

    async fn list_follow_ups(&self, email_id: &str) -> ScrapeDashResult<Vec<Value>> {
        self.get_list(&["emails", email_id, "follow-ups"]).await
    }

    async fn get_job_text(&self, job_id: &str) -> ScrapeDashResult<Option<String>> {
        let (status, response) = self.get(&["jobs", job_id, "text"]).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ScrapeDashError::HttpRequest {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScrapeDashError::network(format!("Failed to read text body: {}", e)))?;
        Ok(text_from_body(body))
    }
}

/// The text endpoint answers with plain text, a JSON string or
/// `{"text": ...}`
fn text_from_body(body: String) -> Option<String> {
    let text = match serde_json::from_str::<Value>(&body) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => map
            .get("text")
            .or_else(|| map.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default(),
        Ok(Value::Null) => String::new(),
        _ => body,
    };

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
