use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub max_files: usize,
    pub log_directory: PathBuf,
    pub include_spans: bool,
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: true,
            console_enabled: true,
            max_files: 5,
            log_directory: PathBuf::from("logs"),
            include_spans: false,
            include_targets: true,
        }
    }
}

/// Initialize logging system
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let span_events = if config.include_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();

    // Console layer; stdout carries command output so logs go to stderr
    if config.console_enabled {
        let console_layer = fmt::layer()
            .with_target(config.include_targets)
            .with_span_events(span_events.clone())
            .with_writer(std::io::stderr)
            .boxed();

        layers.push(console_layer);
    }

    // File layer
    if config.file_enabled {
        std::fs::create_dir_all(&config.log_directory)?;

        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("scrapedash")
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(&config.log_directory)?;

        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_target(config.include_targets)
            .with_span_events(span_events)
            .with_writer(file_appender)
            .boxed();

        layers.push(file_layer);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .init();

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_enabled {
        info!("Log directory: {}", config.log_directory.display());
    }

    Ok(())
}

/// Structured logging context
#[derive(Debug, Clone, Serialize)]
pub struct LogContext {
    pub component: String,
    pub operation: String,
    pub request_id: Option<String>,
    pub entity_kind: Option<String>,
    pub record_count: Option<u64>,
    pub duration_ms: Option<u64>,
    pub status: Option<String>,
    pub error_category: Option<String>,
    pub additional_fields: HashMap<String, serde_json::Value>,
}

impl LogContext {
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            request_id: None,
            entity_kind: None,
            record_count: None,
            duration_ms: None,
            status: None,
            error_category: None,
            additional_fields: HashMap::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_entity_kind(mut self, kind: impl Into<String>) -> Self {
        self.entity_kind = Some(kind.into());
        self
    }

    pub fn with_record_count(mut self, count: usize) -> Self {
        self.record_count = Some(count as u64);
        self
    }

    pub fn with_duration(mut self, duration: std::time::Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_error_category(mut self, category: impl Into<String>) -> Self {
        self.error_category = Some(category.into());
        self
    }

    pub fn with_string_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_fields.insert(key.into(), serde_json::Value::String(value.into()));
        self
    }
}

/// Structured logging macros
#[macro_export]
macro_rules! log_info {
    ($context:expr, $message:expr) => {
        tracing::info!(
            component = $context.component,
            operation = $context.operation,
            request_id = $context.request_id,
            entity_kind = $context.entity_kind,
            record_count = $context.record_count,
            duration_ms = $context.duration_ms,
            status = $context.status,
            additional_fields = ?$context.additional_fields,
            "{}", $message
        );
    };
}

#[macro_export]
macro_rules! log_warn {
    ($context:expr, $message:expr) => {
        tracing::warn!(
            component = $context.component,
            operation = $context.operation,
            request_id = $context.request_id,
            entity_kind = $context.entity_kind,
            status = $context.status,
            error_category = $context.error_category,
            additional_fields = ?$context.additional_fields,
            "{}", $message
        );
    };

    ($context:expr, $error:expr, $message:expr) => {
        tracing::warn!(
            component = $context.component,
            operation = $context.operation,
            request_id = $context.request_id,
            entity_kind = $context.entity_kind,
            status = $context.status,
            error_category = $context.error_category,
            additional_fields = ?$context.additional_fields,
            error = %$error,
            "{}", $message
        );
    };
}

#[macro_export]
macro_rules! log_debug {
    ($context:expr, $message:expr) => {
        tracing::debug!(
            component = $context.component,
            operation = $context.operation,
            request_id = $context.request_id,
            additional_fields = ?$context.additional_fields,
            "{}", $message
        );
    };
}

/// Performance measurement utilities
pub struct PerformanceLogger {
    context: LogContext,
    start_time: std::time::Instant,
}

impl PerformanceLogger {
    pub fn new(context: LogContext) -> Self {
        Self {
            context,
            start_time: std::time::Instant::now(),
        }
    }

    /// Attach the number of records the measured operation handled
    pub fn with_record_count(mut self, count: usize) -> Self {
        self.context = self.context.with_record_count(count);
        self
    }

    pub fn finish_with_status(self, message: &str, status: impl Into<String>) {
        let context = self.context
            .with_duration(self.start_time.elapsed())
            .with_status(status);
        log_info!(context, message);
    }

    pub fn finish_with_error(self, message: &str, error: &crate::error::ScrapeDashError) {
        let context = self.context
            .with_duration(self.start_time.elapsed())
            .with_status("error")
            .with_error_category(error.category());
        tracing::error!(
            component = context.component,
            operation = context.operation,
            request_id = context.request_id,
            entity_kind = context.entity_kind,
            record_count = context.record_count,
            duration_ms = context.duration_ms,
            status = context.status,
            error_category = context.error_category,
            additional_fields = ?context.additional_fields,
            error = %error,
            "{}", message
        );
    }
}

/// Request ID generation
pub struct RequestIdGenerator;

impl RequestIdGenerator {
    pub fn generate() -> String {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let timestamp = chrono::Utc::now().timestamp_millis();
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

        format!("exp-{}-{:04}", timestamp, counter % 10000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_creation() {
        let context = LogContext::new("export", "run_export")
            .with_request_id("exp-123")
            .with_entity_kind("ai-job")
            .with_record_count(7)
            .with_string_field("format", "csv");

        assert_eq!(context.component, "export");
        assert_eq!(context.operation, "run_export");
        assert_eq!(context.request_id, Some("exp-123".to_string()));
        assert_eq!(context.record_count, Some(7));
        assert!(context.additional_fields.contains_key("format"));
    }

    #[test]
    fn test_request_id_generation() {
        let id1 = RequestIdGenerator::generate();
        let id2 = RequestIdGenerator::generate();

        assert_ne!(id1, id2);
        assert!(id1.starts_with("exp-"));
    }

    #[test]
    fn test_performance_logger_without_subscriber() {
        let context = LogContext::new("export", "test");
        let perf = PerformanceLogger::new(context.clone()).with_record_count(3);
        assert_eq!(perf.context.record_count, Some(3));
        perf.finish_with_status("done", "success");
        PerformanceLogger::new(context).finish_with_error("failed", &crate::error::ScrapeDashError::EmptyExport);
    }
}
