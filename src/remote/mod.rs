//! Remote scraping service: the collaborator that supplies entities.
//!
//! The export engine never talks to the network; everything here runs
//! before an export to turn API responses into in-memory entities.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

pub mod gather;
pub mod http_client;

pub use gather::{fetch_entities, gather_scratcher_bundles};
pub use http_client::ApiClient;

use crate::error::ScrapeDashResult;

/// Read access to jobs, their emails and the emails' follow-ups
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn list_jobs(&self) -> ScrapeDashResult<Vec<Value>>;

    async fn list_ai_jobs(&self) -> ScrapeDashResult<Vec<Value>>;

    async fn get_job(&self, job_id: &str) -> ScrapeDashResult<Value>;

    async fn list_emails(&self, job_id: &str) -> ScrapeDashResult<Vec<Value>>;

    async fn list_follow_ups(&self, email_id: &str) -> ScrapeDashResult<Vec<Value>>;

    /// Large scraped text attached to a job, if the service has one
    async fn get_job_text(&self, job_id: &str) -> ScrapeDashResult<Option<String>>;
}

/// Pull the record list out of a list response.
///
/// Accepts a bare array or an object wrapping it under `items`, `data`
/// or `results`; anything else yields no records.
pub fn extract_list(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in ["items", "data", "results"] {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return items;
                }
            }
            warn!("List response has no record array; keys: {:?}", map.keys().collect::<Vec<_>>());
            Vec::new()
        }
        other => {
            warn!("Unexpected list response type: {}", other);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_list_shapes() {
        assert_eq!(extract_list(json!([{"job_id": "j1"}])).len(), 1);
        assert_eq!(extract_list(json!({"items": [1, 2]})), vec![json!(1), json!(2)]);
        assert_eq!(extract_list(json!({"data": [], "total": 0})).len(), 0);
        assert_eq!(extract_list(json!({"results": [{"id": 1}]})).len(), 1);
        assert!(extract_list(json!({"job_id": "j1"})).is_empty());
        assert!(extract_list(json!("oops")).is_empty());
    }
}
