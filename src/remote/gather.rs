use serde_json::{json, Value};
use tracing::{debug, info};

use super::EntitySource;
use crate::entity::{id_of, EntityKind};
use crate::error::ScrapeDashResult;
use crate::logging::LogContext;

/// Fetch the top-level entities of `kind`.
///
/// Scratcher composites are assembled from the job list with
/// [`gather_scratcher_bundles`].
pub async fn fetch_entities<S>(source: &S, kind: EntityKind) -> ScrapeDashResult<Vec<Value>>
where
    S: EntitySource + ?Sized,
{
    let entities = match kind {
        EntityKind::Job => source.list_jobs().await?,
        EntityKind::AiJob => source.list_ai_jobs().await?,
        EntityKind::Scratcher => {
            let jobs = source.list_jobs().await?;
            gather_scratcher_bundles(source, &jobs).await
        }
    };

    info!("Fetched {} {} entities", entities.len(), kind);
    Ok(entities)
}

/// Build `{job, emails, follow_ups, text}` composites for each job.
///
/// Children are fetched one at a time, in order. A failed child fetch is
/// logged and replaced by an empty collection (or no text) so the rest of
/// the batch still comes through.
pub async fn gather_scratcher_bundles<S>(source: &S, jobs: &[Value]) -> Vec<Value>
where
    S: EntitySource + ?Sized,
{
    let mut bundles = Vec::with_capacity(jobs.len());

    for job in jobs {
        let job_id = match id_of(job, &["job_id", "id"]) {
            Some(id) => id,
            None => {
                debug!("Job without id, bundling it without children");
                bundles.push(json!({"job": job, "emails": [], "follow_ups": [], "text": null}));
                continue;
            }
        };

        let emails = match source.list_emails(&job_id).await {
            Ok(emails) => emails,
            Err(e) => {
                let context = LogContext::new("gather", "list_emails")
                    .with_entity_kind("email")
                    .with_error_category(e.category())
                    .with_string_field("job_id", job_id.as_str());
                crate::log_warn!(context, e, "Email fetch failed, continuing with none");
                Vec::new()
            }
        };

        let mut follow_ups = Vec::new();
        for email in &emails {
            let email_id = match id_of(email, &["email_id", "id"]) {
                Some(id) => id,
                None => continue,
            };

            match source.list_follow_ups(&email_id).await {
                Ok(mut fetched) => follow_ups.append(&mut fetched),
                Err(e) => {
                    let context = LogContext::new("gather", "list_follow_ups")
                        .with_entity_kind("follow-up")
                        .with_error_category(e.category())
                        .with_string_field("job_id", job_id.as_str())
                        .with_string_field("email_id", email_id.as_str());
                    crate::log_warn!(context, e, "Follow-up fetch failed, continuing with none");
                }
            }
        }

        let text = match source.get_job_text(&job_id).await {
            Ok(text) => text,
            Err(e) => {
                let context = LogContext::new("gather", "get_job_text")
                    .with_error_category(e.category())
                    .with_string_field("job_id", job_id.as_str());
                crate::log_warn!(context, e, "Text fetch failed, continuing without it");
                None
            }
        };

        debug!(
            "Bundled job {}: {} emails, {} follow-ups",
            job_id,
            emails.len(),
            follow_ups.len()
        );
        bundles.push(json!({
            "job": job,
            "emails": emails,
            "follow_ups": follow_ups,
            "text": text,
        }));
    }

    bundles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeDashError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySource {
        jobs: Vec<Value>,
        emails: HashMap<String, Vec<Value>>,
        follow_ups: HashMap<String, Vec<Value>>,
        texts: HashMap<String, String>,
        failing: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl MemorySource {
        fn record(&self, call: String) -> ScrapeDashResult<()> {
            let fails = self.failing.contains(&call);
            self.calls.lock().unwrap().push(call.clone());
            if fails {
                Err(ScrapeDashError::HttpRequest { url: call, status: 500 })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl EntitySource for MemorySource {
        async fn list_jobs(&self) -> ScrapeDashResult<Vec<Value>> {
            self.record("jobs".to_string())?;
            Ok(self.jobs.clone())
        }

        async fn list_ai_jobs(&self) -> ScrapeDashResult<Vec<Value>> {
            self.record("ai-jobs".to_string())?;
            Ok(Vec::new())
        }

        async fn get_job(&self, job_id: &str) -> ScrapeDashResult<Value> {
            self.record(format!("jobs/{}", job_id))?;
            Ok(json!({"job_id": job_id}))
        }

        async fn list_emails(&self, job_id: &str) -> ScrapeDashResult<Vec<Value>> {
            self.record(format!("jobs/{}/emails", job_id))?;
            Ok(self.emails.get(job_id).cloned().unwrap_or_default())
        }

        async fn list_follow_ups(&self, email_id: &str) -> ScrapeDashResult<Vec<Value>> {
            self.record(format!("emails/{}/follow-ups", email_id))?;
            Ok(self.follow_ups.get(email_id).cloned().unwrap_or_default())
        }

        async fn get_job_text(&self, job_id: &str) -> ScrapeDashResult<Option<String>> {
            self.record(format!("jobs/{}/text", job_id))?;
            Ok(self.texts.get(job_id).cloned())
        }
    }

    fn source() -> MemorySource {
        let mut source = MemorySource {
            jobs: vec![json!({"job_id": "j1"}), json!({"job_id": "j2"})],
            ..Default::default()
        };
        source.emails.insert(
            "j1".to_string(),
            vec![json!({"email_id": "e1"}), json!({"email_id": "e2"})],
        );
        source.emails.insert("j2".to_string(), vec![json!({"email_id": "e3"})]);
        source.follow_ups.insert("e1".to_string(), vec![json!({"follow_up_id": "f1"})]);
        source.follow_ups.insert("e2".to_string(), vec![json!({"follow_up_id": "f2"})]);
        source.follow_ups.insert("e3".to_string(), vec![json!({"follow_up_id": "f3"})]);
        source.texts.insert("j1".to_string(), "scraped".to_string());
        source
    }

    #[tokio::test]
    async fn test_gather_builds_composites_in_order() {
        let source = source();
        let bundles = gather_scratcher_bundles(&source, &source.jobs).await;

        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0]["emails"].as_array().unwrap().len(), 2);
        assert_eq!(bundles[0]["follow_ups"], json!([{"follow_up_id": "f1"}, {"follow_up_id": "f2"}]));
        assert_eq!(bundles[0]["text"], json!("scraped"));
        assert_eq!(bundles[1]["text"], json!(null));

        let calls = source.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "jobs/j1/emails",
                "emails/e1/follow-ups",
                "emails/e2/follow-ups",
                "jobs/j1/text",
                "jobs/j2/emails",
                "emails/e3/follow-ups",
                "jobs/j2/text",
            ]
        );
    }

    #[tokio::test]
    async fn test_gather_tolerates_child_failures() {
        let mut source = source();
        source.failing = vec![
            "jobs/j1/emails".to_string(),
            "emails/e3/follow-ups".to_string(),
            "jobs/j2/text".to_string(),
        ];

        let bundles = gather_scratcher_bundles(&source, &source.jobs).await;

        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0]["emails"], json!([]));
        assert_eq!(bundles[0]["follow_ups"], json!([]));
        assert_eq!(bundles[0]["text"], json!("scraped"));
        assert_eq!(bundles[1]["emails"].as_array().unwrap().len(), 1);
        assert_eq!(bundles[1]["follow_ups"], json!([]));
        assert_eq!(bundles[1]["text"], json!(null));
    }

    #[tokio::test]
    async fn test_fetch_entities_by_kind() {
        let source = source();

        let jobs = fetch_entities(&source, EntityKind::Job).await.unwrap();
        assert_eq!(jobs.len(), 2);

        let bundles = fetch_entities(&source, EntityKind::Scratcher).await.unwrap();
        assert_eq!(bundles[1]["job"]["job_id"], json!("j2"));
        assert_eq!(EntityKind::Scratcher.primary_id(&bundles[0]), Some("j1".to_string()));
    }

    #[tokio::test]
    async fn test_parent_list_failure_is_fatal() {
        let mut source = source();
        source.failing = vec!["ai-jobs".to_string()];
        assert!(fetch_entities(&source, EntityKind::AiJob).await.is_err());
    }

    #[tokio::test]
    async fn test_job_without_id_gets_empty_children() {
        let source = source();
        let bundles = gather_scratcher_bundles(&source, &[json!({"url": "https://a.example"})]).await;
        assert_eq!(bundles[0]["emails"], json!([]));
        assert!(source.calls.lock().unwrap().is_empty());
    }
}
