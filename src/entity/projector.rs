//! Per-kind field projection at basic / summary / full fidelity.
//!
//! Every level is a superset of the one below it. Missing fields fall back
//! to `""` or `0` so ragged upstream records still project to a complete
//! row; projection itself never fails.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{any_present, as_record, children, field_or, is_present, EntityKind};

/// Degree of per-entity detail kept in an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLevel {
    Basic,
    Summary,
    Full,
}

impl std::str::FromStr for DataLevel {
    type Err = crate::error::ScrapeDashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(DataLevel::Basic),
            "summary" => Ok(DataLevel::Summary),
            "full" => Ok(DataLevel::Full),
            _ => Err(crate::error::ScrapeDashError::invalid_option("data level", s)),
        }
    }
}

impl std::fmt::Display for DataLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataLevel::Basic => write!(f, "basic"),
            DataLevel::Summary => write!(f, "summary"),
            DataLevel::Full => write!(f, "full"),
        }
    }
}

#[derive(Clone, Copy)]
enum Fallback {
    Text,
    Count,
}

/// Output column, the upstream keys it is read from (first present wins)
/// and its default.
struct Field {
    name: &'static str,
    sources: &'static [&'static str],
    fallback: Fallback,
}

const fn text(name: &'static str, sources: &'static [&'static str]) -> Field {
    Field { name, sources, fallback: Fallback::Text }
}

const fn count(name: &'static str, sources: &'static [&'static str]) -> Field {
    Field { name, sources, fallback: Fallback::Count }
}

const JOB_BASIC: &[Field] = &[
    text("job_id", &["job_id", "id"]),
    text("url", &["url"]),
    text("status", &["status"]),
    text("created_at", &["created_at"]),
    text("updated_at", &["updated_at"]),
    count("pages_crawled", &["pages_crawled"]),
];

const JOB_SUMMARY: &[Field] = &[
    count("max_pages", &["max_pages"]),
    text("completed_at", &["completed_at"]),
    text("error", &["error", "error_message"]),
];

const AI_JOB_BASIC: &[Field] = &[
    text("job_id", &["job_id", "id"]),
    text("url", &["url"]),
    text("status", &["status"]),
    text("strategy", &["strategy"]),
    text("llm_provider", &["llm_provider"]),
    text("output_format", &["output_format"]),
    text("created_at", &["created_at"]),
    text("updated_at", &["updated_at"]),
    count("pages_crawled", &["pages_crawled"]),
];

const AI_JOB_SUMMARY: &[Field] = &[
    text("prompt", &["prompt", "extraction_prompt"]),
    text("model", &["model", "llm_model"]),
    count("max_pages", &["max_pages"]),
    text("completed_at", &["completed_at"]),
    text("error", &["error", "error_message"]),
];

const EMAIL_BASIC: &[Field] = &[
    text("email_id", &["email_id", "id"]),
    text("job_id", &["job_id"]),
    text("recipient", &["recipient", "to"]),
    text("subject", &["subject"]),
    text("status", &["status"]),
    text("created_at", &["created_at"]),
    text("sent_at", &["sent_at"]),
];

const EMAIL_SUMMARY: &[Field] = &[
    text("sender", &["sender", "from"]),
    text("contact_name", &["contact_name"]),
    text("company", &["company"]),
    text("error", &["error", "error_message"]),
];

const FOLLOW_UP_BASIC: &[Field] = &[
    text("follow_up_id", &["follow_up_id", "id"]),
    text("email_id", &["email_id"]),
    text("status", &["status"]),
    count("sequence", &["sequence", "step"]),
    text("scheduled_at", &["scheduled_at"]),
    text("sent_at", &["sent_at"]),
];

const FOLLOW_UP_SUMMARY: &[Field] = &[
    text("subject", &["subject"]),
    text("error", &["error", "error_message"]),
];

/// Project a top-level entity of `kind` at `level`
pub fn project(kind: EntityKind, entity: &Value, level: DataLevel) -> Value {
    let projected = match kind {
        EntityKind::Job => project_job(entity, level),
        EntityKind::AiJob => project_ai_job(entity, level),
        EntityKind::Scratcher => project_scratcher(entity, level),
    };
    Value::Object(projected)
}

/// Project one email record (a scratcher child)
pub fn project_email(email: &Value, level: DataLevel) -> Value {
    let mut out = Map::new();
    copy_fields(&mut out, email, EMAIL_BASIC);
    if level >= DataLevel::Summary {
        copy_fields(&mut out, email, EMAIL_SUMMARY);
        out.insert("has_body".into(), json!(any_present(email, &["body", "body_html", "body_url"])));
        out.insert("reply_received".into(), json!(is_present(email.get("replied_at"))));
    }
    Value::Object(finish(email, out, level))
}

/// Project one follow-up record (a scratcher grandchild)
pub fn project_follow_up(follow_up: &Value, level: DataLevel) -> Value {
    let mut out = Map::new();
    copy_fields(&mut out, follow_up, FOLLOW_UP_BASIC);
    if level >= DataLevel::Summary {
        copy_fields(&mut out, follow_up, FOLLOW_UP_SUMMARY);
        out.insert("has_body".into(), json!(any_present(follow_up, &["body", "body_html", "body_url"])));
    }
    Value::Object(finish(follow_up, out, level))
}

fn project_job(job: &Value, level: DataLevel) -> Map<String, Value> {
    let mut out = Map::new();
    copy_fields(&mut out, job, JOB_BASIC);
    if level >= DataLevel::Summary {
        copy_fields(&mut out, job, JOB_SUMMARY);
        out.insert("has_markdown".into(), json!(any_present(job, &["markdown", "markdown_url", "markdown_path"])));
        out.insert("has_html".into(), json!(any_present(job, &["html", "html_url", "html_path"])));
        out.insert(
            "has_screenshot".into(),
            json!(any_present(job, &["screenshot", "screenshot_url", "screenshot_path"])),
        );
    }
    finish(job, out, level)
}

fn project_ai_job(job: &Value, level: DataLevel) -> Map<String, Value> {
    let mut out = Map::new();
    copy_fields(&mut out, job, AI_JOB_BASIC);
    if level >= DataLevel::Summary {
        copy_fields(&mut out, job, AI_JOB_SUMMARY);
        out.insert("has_result".into(), json!(any_present(job, &["result", "result_url", "result_path"])));
        out.insert("has_markdown".into(), json!(any_present(job, &["markdown", "markdown_url", "markdown_path"])));
    }
    finish(job, out, level)
}

fn project_scratcher(bundle: &Value, level: DataLevel) -> Map<String, Value> {
    let job = bundle.get("job").unwrap_or(&Value::Null);
    let emails = children(bundle, "emails");
    let follow_ups = children(bundle, "follow_ups");

    let mut out = project_job(job, level);
    out.insert("email_count".into(), json!(emails.len()));
    out.insert("follow_up_count".into(), json!(follow_ups.len()));

    if level >= DataLevel::Summary {
        // Children keep full detail only in full exports
        let child_level = if level == DataLevel::Full { DataLevel::Full } else { DataLevel::Basic };
        out.insert("has_text".into(), json!(is_present(bundle.get("text"))));
        out.insert(
            "emails".into(),
            Value::Array(emails.iter().map(|e| project_email(e, child_level)).collect()),
        );
        out.insert(
            "follow_ups".into(),
            Value::Array(follow_ups.iter().map(|f| project_follow_up(f, child_level)).collect()),
        );
    }

    if level == DataLevel::Full {
        out.insert("text".into(), field_or(bundle, "text", json!("")));
    }

    out
}

fn copy_fields(out: &mut Map<String, Value>, record: &Value, fields: &[Field]) {
    for field in fields {
        let default = match field.fallback {
            Fallback::Text => json!(""),
            Fallback::Count => json!(0),
        };
        let value = field
            .sources
            .iter()
            .map(|source| field_or(record, source, Value::Null))
            .find(|value| !value.is_null())
            .unwrap_or(default);
        out.insert(field.name.to_string(), value);
    }
}

/// Full level keeps every raw field, with the projected fields laid over it
fn finish(record: &Value, projected: Map<String, Value>, level: DataLevel) -> Map<String, Value> {
    if level != DataLevel::Full {
        return projected;
    }
    let mut full = as_record(record);
    full.extend(projected);
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn keys(value: &Value) -> BTreeSet<String> {
        value.as_object().unwrap().keys().cloned().collect()
    }

    fn sample_ai_job() -> Value {
        json!({
            "job_id": "ai-1",
            "url": "https://example.com",
            "status": "completed",
            "strategy": "bfs",
            "llm_provider": "openai",
            "output_format": "json",
            "created_at": "2024-01-15T10:00:00Z",
            "updated_at": "2024-01-15T10:05:00Z",
            "pages_crawled": 12,
            "prompt": "Extract prices",
            "result": {"items": [{"price": 9.5}]},
            "settings": {"depth": 2, "follow_links": true}
        })
    }

    fn sample_bundle() -> Value {
        json!({
            "job": {"job_id": "s1", "url": "https://shop.example", "status": "completed"},
            "emails": [
                {"email_id": "e1", "job_id": "s1", "to": "a@example.com", "subject": "Hello", "body": "Hi"},
                {"email_id": "e2", "job_id": "s1", "recipient": "b@example.com"}
            ],
            "follow_ups": [
                {"follow_up_id": "f1", "email_id": "e1", "step": 1}
            ],
            "text": "long scraped text"
        })
    }

    #[test]
    fn test_ai_job_basic_fields() {
        let projected = project(EntityKind::AiJob, &sample_ai_job(), DataLevel::Basic);
        let expected: BTreeSet<String> = [
            "job_id", "url", "status", "strategy", "llm_provider",
            "output_format", "created_at", "updated_at", "pages_crawled",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(keys(&projected), expected);
        assert_eq!(projected["pages_crawled"], json!(12));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let projected = project(EntityKind::AiJob, &json!({"job_id": "x"}), DataLevel::Summary);
        assert_eq!(projected["url"], json!(""));
        assert_eq!(projected["pages_crawled"], json!(0));
        assert_eq!(projected["max_pages"], json!(0));
        assert_eq!(projected["has_result"], json!(false));

        let projected = project(EntityKind::Job, &json!(null), DataLevel::Full);
        assert_eq!(projected["job_id"], json!(""));
        assert_eq!(projected["has_html"], json!(false));
    }

    #[test]
    fn test_derived_flags() {
        let projected = project(EntityKind::AiJob, &sample_ai_job(), DataLevel::Summary);
        assert_eq!(projected["has_result"], json!(true));
        assert_eq!(projected["has_markdown"], json!(false));

        let job = json!({"job_id": "j1", "markdown_url": "https://cdn/j1.md", "html": ""});
        let projected = project(EntityKind::Job, &job, DataLevel::Summary);
        assert_eq!(projected["has_markdown"], json!(true));
        assert_eq!(projected["has_html"], json!(false));
    }

    #[test]
    fn test_full_keeps_raw_fields() {
        let projected = project(EntityKind::AiJob, &sample_ai_job(), DataLevel::Full);
        assert_eq!(projected["settings"]["depth"], json!(2));
        assert_eq!(projected["has_result"], json!(true));
        assert_eq!(projected["result"]["items"][0]["price"], json!(9.5));
    }

    #[test]
    fn test_fidelity_levels_are_nested() {
        let cases = vec![
            (EntityKind::Job, json!({"job_id": "j1", "url": "u", "extra": {"a": 1}})),
            (EntityKind::Job, json!({})),
            (EntityKind::AiJob, sample_ai_job()),
            (EntityKind::AiJob, json!({"id": 7})),
            (EntityKind::Scratcher, sample_bundle()),
            (EntityKind::Scratcher, json!({"job": null})),
        ];

        for (kind, entity) in cases {
            let basic = keys(&project(kind, &entity, DataLevel::Basic));
            let summary = keys(&project(kind, &entity, DataLevel::Summary));
            let full = keys(&project(kind, &entity, DataLevel::Full));
            assert!(basic.is_subset(&summary), "{kind}: basic not within summary");
            assert!(summary.is_subset(&full), "{kind}: summary not within full");
        }

        let children = vec![
            json!({"email_id": "e1", "to": "a@example.com", "body": "Hi", "opened": true}),
            json!({}),
            json!({"follow_up_id": "f1", "step": 2, "body_html": "<p>again</p>"}),
        ];
        for child in &children {
            for project_child in [project_email, project_follow_up] {
                let basic = keys(&project_child(child, DataLevel::Basic));
                let summary = keys(&project_child(child, DataLevel::Summary));
                let full = keys(&project_child(child, DataLevel::Full));
                assert!(basic.is_subset(&summary), "{child}: basic not within summary");
                assert!(summary.is_subset(&full), "{child}: summary not within full");
            }
        }
    }

    #[test]
    fn test_scratcher_projection() {
        let bundle = sample_bundle();

        let basic = project(EntityKind::Scratcher, &bundle, DataLevel::Basic);
        assert_eq!(basic["job_id"], json!("s1"));
        assert_eq!(basic["email_count"], json!(2));
        assert_eq!(basic["follow_up_count"], json!(1));
        assert!(basic.get("emails").is_none());

        let summary = project(EntityKind::Scratcher, &bundle, DataLevel::Summary);
        assert_eq!(summary["has_text"], json!(true));
        assert_eq!(summary["emails"][0]["recipient"], json!("a@example.com"));
        assert!(summary["emails"][0].get("has_body").is_none());
        assert!(summary.get("text").is_none());

        let full = project(EntityKind::Scratcher, &bundle, DataLevel::Full);
        assert_eq!(full["text"], json!("long scraped text"));
        assert_eq!(full["emails"][0]["has_body"], json!(true));
        assert_eq!(full["emails"][0]["to"], json!("a@example.com"));
        assert_eq!(full["follow_ups"][0]["sequence"], json!(1));
    }

    #[test]
    fn test_projection_does_not_mutate_input() {
        let entity = sample_ai_job();
        let before = entity.clone();
        let _ = project(EntityKind::AiJob, &entity, DataLevel::Full);
        assert_eq!(entity, before);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("SUMMARY".parse::<DataLevel>().unwrap(), DataLevel::Summary);
        assert!("everything".parse::<DataLevel>().is_err());
        assert_eq!(DataLevel::Full.to_string(), "full");
    }
}
