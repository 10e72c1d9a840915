//! Entity model for records fetched from the scraping service.
//!
//! Entities stay as `serde_json::Value` because upstream records are
//! arbitrarily nested and their shape is not validated here. This module
//! only knows how to name a batch, find a record's primary id and read
//! fields with defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod projector;

pub use projector::{project, project_email, project_follow_up, DataLevel};

/// Kind of the top-level entities in an export batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    Job,
    AiJob,
    Scratcher,
}

impl std::str::FromStr for EntityKind {
    type Err = crate::error::ScrapeDashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "job" | "jobs" => Ok(EntityKind::Job),
            "ai-job" | "ai-jobs" | "ai_job" => Ok(EntityKind::AiJob),
            "scratcher" => Ok(EntityKind::Scratcher),
            _ => Err(crate::error::ScrapeDashError::invalid_option("entity kind", s)),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Job => write!(f, "job"),
            EntityKind::AiJob => write!(f, "ai-job"),
            EntityKind::Scratcher => write!(f, "scratcher"),
        }
    }
}

impl EntityKind {
    /// Prefix used in export file names
    pub fn file_prefix(&self) -> &'static str {
        match self {
            EntityKind::Job => "jobs",
            EntityKind::AiJob => "ai-jobs",
            EntityKind::Scratcher => "scratcher",
        }
    }

    /// Sheet name for single-sheet workbook exports
    pub fn sheet_name(&self) -> &'static str {
        match self {
            EntityKind::Job => "Jobs",
            EntityKind::AiJob => "AI Jobs",
            EntityKind::Scratcher => "Websites",
        }
    }

    /// Primary id of a top-level entity of this kind
    pub fn primary_id(&self, entity: &Value) -> Option<String> {
        match self {
            EntityKind::Job | EntityKind::AiJob => id_of(entity, &["job_id", "id"]),
            EntityKind::Scratcher => entity
                .get("job")
                .and_then(|job| id_of(job, &["job_id", "id"])),
        }
    }
}

/// First present id among `keys`, rendered as a string
pub fn id_of(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Field value, or `default` when the field is absent or null
pub fn field_or(record: &Value, key: &str, default: Value) -> Value {
    match record.get(key) {
        None | Some(Value::Null) => default,
        Some(value) => value.clone(),
    }
}

/// Whether a field holds something: not null, not an empty string,
/// array or object
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

/// True if any of the named fields is present on the record
pub fn any_present(record: &Value, keys: &[&str]) -> bool {
    keys.iter().any(|key| is_present(record.get(*key)))
}

/// Child collection of a composite, empty when absent or not an array
pub fn children<'a>(entity: &'a Value, key: &str) -> &'a [Value] {
    entity
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Object view of a record; non-objects are treated as empty records
pub fn as_record(value: &Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primary_id_lookup() {
        assert_eq!(
            EntityKind::Job.primary_id(&json!({"job_id": "j1"})),
            Some("j1".to_string())
        );
        assert_eq!(
            EntityKind::AiJob.primary_id(&json!({"id": 42})),
            Some("42".to_string())
        );
        assert_eq!(
            EntityKind::Scratcher.primary_id(&json!({"job": {"job_id": "s1"}, "emails": []})),
            Some("s1".to_string())
        );
        assert_eq!(EntityKind::Job.primary_id(&json!({"url": "https://a.com"})), None);
    }

    #[test]
    fn test_presence_rules() {
        assert!(!is_present(None));
        assert!(!is_present(Some(&json!(null))));
        assert!(!is_present(Some(&json!(""))));
        assert!(!is_present(Some(&json!([]))));
        assert!(!is_present(Some(&json!({}))));
        assert!(is_present(Some(&json!("x"))));
        assert!(is_present(Some(&json!(0))));
        assert!(is_present(Some(&json!(false))));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("ai-job".parse::<EntityKind>().unwrap(), EntityKind::AiJob);
        assert_eq!("Scratcher".parse::<EntityKind>().unwrap(), EntityKind::Scratcher);
        assert!("website".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_children_defaults_to_empty() {
        let bundle = json!({"job": {}, "emails": "not-a-list"});
        assert!(children(&bundle, "emails").is_empty());
        assert!(children(&bundle, "follow_ups").is_empty());
    }
}
