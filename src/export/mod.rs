use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

pub mod csv_exporter;
pub mod flatten;
pub mod json_exporter;
pub mod scope;
pub mod xlsx_exporter;

pub use flatten::{DataTransformer, FlatRow, Table, ARRAY_SEPARATOR};
pub use scope::{select_scope, ExportScope};
pub use xlsx_exporter::SheetData;

use crate::config::ExportConfig;
use crate::entity::{project, DataLevel, EntityKind};
use crate::error::{ScrapeDashError, ScrapeDashResult};
use crate::logging::{LogContext, PerformanceLogger, RequestIdGenerator};
use crate::utils::file_utils::FileUtils;

/// Export format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Xlsx,
}

impl std::str::FromStr for ExportFormat {
    type Err = ScrapeDashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            _ => Err(ScrapeDashError::UnsupportedFormat { format: s.to_string() }),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl ExportFormat {
    /// File extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv;charset=utf-8",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }
}

/// Options chosen in the export dialog.
///
/// `format` stays a raw tag until dispatch so that an empty selection is
/// reported before an unknown format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub format: String,
    pub scope: ExportScope,
    #[serde(alias = "dataLevel")]
    pub data_level: DataLevel,
}

impl ExportOptions {
    pub fn new(format: impl Into<String>, scope: ExportScope, data_level: DataLevel) -> Self {
        Self {
            format: format.into(),
            scope,
            data_level,
        }
    }
}

/// A fully materialized export, ready to be handed off
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub format: ExportFormat,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub record_count: usize,
}

/// Export statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStats {
    pub request_id: String,
    pub format: ExportFormat,
    pub file_path: String,
    pub record_count: usize,
    pub file_size_bytes: u64,
    pub export_duration_ms: u64,
}

/// `<prefix>-export-<timestamp>.<ext>` with colons and millis stripped
pub fn export_file_name(prefix: &str, format: ExportFormat, at: DateTime<Utc>) -> String {
    format!(
        "{}-export-{}.{}",
        prefix,
        at.format("%Y-%m-%dT%H-%M-%S"),
        format.extension()
    )
}

/// Run the export pipeline: resolve scope, check the format, project, encode.
///
/// Nothing is written here; the caller decides where the file goes.
pub fn run_export(
    kind: EntityKind,
    all: &[Value],
    filtered: &[Value],
    selected_ids: &HashSet<String>,
    options: &ExportOptions,
) -> ScrapeDashResult<ExportFile> {
    run_export_at(kind, all, filtered, selected_ids, options, Utc::now())
}

/// Same as [`run_export`] with an explicit timestamp for the file name
pub fn run_export_at(
    kind: EntityKind,
    all: &[Value],
    filtered: &[Value],
    selected_ids: &HashSet<String>,
    options: &ExportOptions,
    at: DateTime<Utc>,
) -> ScrapeDashResult<ExportFile> {
    let resolved = select_scope(kind, all, filtered, selected_ids, options.scope)?;
    if resolved.is_empty() {
        return Err(ScrapeDashError::EmptyExport);
    }

    let format: ExportFormat = options.format.parse()?;
    let level = options.data_level;
    let bytes = match (format, kind) {
        // Composites are split into per-kind sheets, each projected on its own
        (ExportFormat::Xlsx, EntityKind::Scratcher) => {
            xlsx_exporter::export_xlsx(&xlsx_exporter::scratcher_sheets(&resolved, level))?
        }
        _ => {
            let projected: Vec<Value> = resolved.iter().map(|entity| project(kind, entity, level)).collect();
            debug!("Projected {} {} records at {} level", projected.len(), kind, level);

            match format {
                ExportFormat::Json => json_exporter::export_json(&projected)?,
                ExportFormat::Csv => csv_exporter::export_csv(&projected)?,
                ExportFormat::Xlsx => {
                    xlsx_exporter::export_xlsx(&[SheetData::build(kind.sheet_name(), &projected)])?
                }
            }
        }
    };

    Ok(ExportFile {
        file_name: export_file_name(kind.file_prefix(), format, at),
        format,
        mime_type: format.mime_type(),
        bytes,
        record_count: resolved.len(),
    })
}

/// Export manager: runs the pipeline and materializes the file
pub struct ExportManager {
    config: ExportConfig,
}

impl ExportManager {
    /// Create new export manager
    pub fn new(config: &ExportConfig) -> ScrapeDashResult<Self> {
        // Ensure output directory exists
        std::fs::create_dir_all(&config.output_directory)?;

        Ok(Self {
            config: config.clone(),
        })
    }

    /// Options to use when the caller does not pick any
    pub fn default_options(&self) -> ExportOptions {
        ExportOptions::new(
            self.config.default_format.clone(),
            self.config.default_scope,
            self.config.default_data_level,
        )
    }

    /// Run an export and write the result into the output directory.
    ///
    /// The file only appears once it is complete; a failed run leaves
    /// the directory untouched. An earlier export with the same name is
    /// kept and the new file gets a numbered name instead.
    pub async fn export(
        &self,
        kind: EntityKind,
        all: &[Value],
        filtered: &[Value],
        selected_ids: &HashSet<String>,
        options: &ExportOptions,
    ) -> ScrapeDashResult<ExportStats> {
        self.export_at(kind, all, filtered, selected_ids, options, Utc::now()).await
    }

    /// Same as [`ExportManager::export`] with an explicit timestamp for the file name
    pub async fn export_at(
        &self,
        kind: EntityKind,
        all: &[Value],
        filtered: &[Value],
        selected_ids: &HashSet<String>,
        options: &ExportOptions,
        at: DateTime<Utc>,
    ) -> ScrapeDashResult<ExportStats> {
        let request_id = RequestIdGenerator::generate();
        let context = LogContext::new("export", "run_export")
            .with_request_id(&request_id)
            .with_entity_kind(kind.to_string())
            .with_string_field("format", options.format.as_str())
            .with_string_field("scope", options.scope.to_string())
            .with_string_field("data_level", options.data_level.to_string());
        crate::log_debug!(context, "Export requested");

        let start_time = std::time::Instant::now();
        let perf = PerformanceLogger::new(context);

        let file = match run_export_at(kind, all, filtered, selected_ids, options, at) {
            Ok(file) => file,
            Err(e) => {
                perf.finish_with_error("Export failed", &e);
                return Err(e);
            }
        };

        let perf = perf.with_record_count(file.record_count);

        let target = self.config.output_directory.join(&file.file_name);
        let output_path = match FileUtils::write_new(&target, &file.bytes, &request_id).await {
            Ok(path) => path,
            Err(e) => {
                perf.finish_with_error("Export could not be written", &e);
                return Err(e);
            }
        };

        let stats = ExportStats {
            request_id,
            format: file.format,
            file_path: output_path.display().to_string(),
            record_count: file.record_count,
            file_size_bytes: file.bytes.len() as u64,
            export_duration_ms: start_time.elapsed().as_millis() as u64,
        };

        perf.finish_with_status(
            &format!(
                "Export completed: {} records, {} bytes ({})",
                stats.record_count, stats.file_size_bytes, file.mime_type
            ),
            "success",
        );
        info!("Exported {} to {}", kind, stats.file_path);

        Ok(stats)
    }
}
