use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use scrapedash::config::AppConfig;
use scrapedash::entity::{project, DataLevel, EntityKind};
use scrapedash::export::{ExportManager, ExportScope};
use scrapedash::logging::{LogContext, RequestIdGenerator};
use scrapedash::poll::{count_in_flight, PollScheduler};
use scrapedash::remote::{extract_list, fetch_entities, ApiClient, EntitySource};
use scrapedash::utils::{format_file_size, truncate_display};

#[derive(Parser)]
#[command(name = "scrapedash")]
#[command(about = "Dashboard client and exporter for the scraping service")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(short, long, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export jobs, AI jobs or scratcher bundles to a file
    Export {
        #[arg(short, long, help = "Entity kind", value_enum)]
        kind: KindArg,

        #[arg(short, long, help = "Read entities from a JSON file instead of the API")]
        input: Option<PathBuf>,

        #[arg(short, long, help = "Output format", value_enum)]
        format: Option<FormatArg>,

        #[arg(short, long, help = "Which entities to export", value_enum)]
        scope: Option<ScopeArg>,

        #[arg(short, long, help = "Detail level", value_enum)]
        level: Option<LevelArg>,

        #[arg(long = "status", help = "Statuses kept by the filtered scope")]
        statuses: Vec<String>,

        #[arg(long = "select", help = "Entity ids for the selected scope")]
        selected: Vec<String>,

        #[arg(short, long, help = "Output directory")]
        output_dir: Option<PathBuf>,
    },

    /// Show one job at full detail
    Show {
        #[arg(help = "Job ID")]
        job_id: String,
    },

    /// Refresh the job list until nothing is in flight
    Watch {
        #[arg(short, long, help = "Entity kind", value_enum, default_value = "job")]
        kind: WatchKindArg,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum KindArg {
    Job,
    AiJob,
    Scratcher,
}

#[derive(ValueEnum, Clone, Copy)]
enum WatchKindArg {
    Job,
    AiJob,
}

#[derive(ValueEnum, Clone, Copy)]
enum FormatArg {
    Json,
    Csv,
    Xlsx,
}

#[derive(ValueEnum, Clone, Copy)]
enum ScopeArg {
    All,
    Filtered,
    Selected,
}

#[derive(ValueEnum, Clone, Copy)]
enum LevelArg {
    Basic,
    Summary,
    Full,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path).await?,
        None => AppConfig::load().await?,
    };

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    scrapedash::logging::init_logging(&config.logging)?;

    let context = LogContext::new("main", "startup")
        .with_request_id(RequestIdGenerator::generate())
        .with_string_field("version", env!("CARGO_PKG_VERSION"));
    scrapedash::log_info!(context, "scrapedash starting up");

    match cli.command {
        Commands::Export {
            kind,
            input,
            format,
            scope,
            level,
            statuses,
            selected,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.export.output_directory = dir;
            }
            let request = ExportRequest {
                kind: convert_kind(kind),
                input,
                format,
                scope,
                level,
                statuses,
                selected,
            };
            export_entities(&config, request).await?;
        }
        Commands::Show { job_id } => {
            show_job(&config, &job_id).await?;
        }
        Commands::Watch { kind } => {
            let kind = match kind {
                WatchKindArg::Job => EntityKind::Job,
                WatchKindArg::AiJob => EntityKind::AiJob,
            };
            watch_jobs(&config, kind).await?;
        }
    }

    Ok(())
}

struct ExportRequest {
    kind: EntityKind,
    input: Option<PathBuf>,
    format: Option<FormatArg>,
    scope: Option<ScopeArg>,
    level: Option<LevelArg>,
    statuses: Vec<String>,
    selected: Vec<String>,
}

async fn export_entities(config: &AppConfig, request: ExportRequest) -> Result<()> {
    let all = match &request.input {
        Some(path) => load_entities(path).await?,
        None => {
            let api = ApiClient::new(&config.api)?;
            fetch_entities(&api, request.kind).await?
        }
    };
    info!("Loaded {} {} entities", all.len(), request.kind);

    let filtered = filter_by_status(request.kind, &all, &request.statuses);
    let selected: HashSet<String> = request.selected.into_iter().collect();

    let manager = ExportManager::new(&config.export)?;
    let mut options = manager.default_options();
    if let Some(format) = request.format {
        options.format = convert_format(format).to_string();
    }
    if let Some(scope) = request.scope {
        options.scope = convert_scope(scope);
    }
    if let Some(level) = request.level {
        options.data_level = convert_level(level);
    }

    match manager.export(request.kind, &all, &filtered, &selected, &options).await {
        Ok(stats) => {
            println!(
                "Exported {} records ({}) to: {}",
                stats.record_count,
                format_file_size(stats.file_size_bytes),
                stats.file_path
            );
            Ok(())
        }
        Err(e) if e.is_user_facing() => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}

async fn load_entities(path: &Path) -> Result<Vec<Value>> {
    let content = tokio::fs::read_to_string(path).await?;
    let body: Value = serde_json::from_str(&content)?;
    Ok(extract_list(body))
}

/// Entities whose status is one of `statuses`; everything when none given
fn filter_by_status(kind: EntityKind, all: &[Value], statuses: &[String]) -> Vec<Value> {
    if statuses.is_empty() {
        return all.to_vec();
    }

    all.iter()
        .filter(|entity| {
            let record = match kind {
                EntityKind::Scratcher => entity.get("job").unwrap_or(&Value::Null),
                _ => *entity,
            };
            record
                .get("status")
                .and_then(Value::as_str)
                .map_or(false, |status| statuses.iter().any(|s| s.eq_ignore_ascii_case(status)))
        })
        .cloned()
        .collect()
}

async fn show_job(config: &AppConfig, job_id: &str) -> Result<()> {
    let api = ApiClient::new(&config.api)?;
    let job = api.get_job(job_id).await?;
    let projected = project(EntityKind::Job, &job, DataLevel::Full);
    println!("{}", serde_json::to_string_pretty(&projected)?);
    Ok(())
}

async fn watch_jobs(config: &AppConfig, kind: EntityKind) -> Result<()> {
    let api = ApiClient::new(&config.api)?;
    let mut scheduler = PollScheduler::new(&config.polling);

    loop {
        match fetch_entities(&api, kind).await {
            Ok(entities) => {
                print_status_table(kind, &entities);
                scheduler.observe(count_in_flight(&entities));
            }
            Err(e) => {
                warn!("Refresh failed: {}", e);
                scheduler.record_failure();
            }
        }

        match scheduler.next_delay() {
            Some(delay) => tokio::time::sleep(delay).await,
            None => {
                println!("No {} entities in flight", kind);
                break;
            }
        }
    }

    Ok(())
}

fn print_status_table(kind: EntityKind, entities: &[Value]) {
    println!("{:<36} {:<12} {:>6} {:<40}", "Job ID", "Status", "Pages", "URL");
    println!("{}", "-".repeat(97));

    for entity in entities {
        let row = project(kind, entity, DataLevel::Basic);
        println!(
            "{:<36} {:<12} {:>6} {:<40}",
            truncate_display(&text(&row["job_id"]), 36),
            truncate_display(&text(&row["status"]), 12),
            text(&row["pages_crawled"]),
            truncate_display(&text(&row["url"]), 40)
        );
    }
}

fn text(value: &Value) -> String {
    scrapedash::export::DataTransformer::value_to_string(value)
}

fn convert_kind(kind: KindArg) -> EntityKind {
    match kind {
        KindArg::Job => EntityKind::Job,
        KindArg::AiJob => EntityKind::AiJob,
        KindArg::Scratcher => EntityKind::Scratcher,
    }
}

fn convert_format(format: FormatArg) -> scrapedash::export::ExportFormat {
    match format {
        FormatArg::Json => scrapedash::export::ExportFormat::Json,
        FormatArg::Csv => scrapedash::export::ExportFormat::Csv,
        FormatArg::Xlsx => scrapedash::export::ExportFormat::Xlsx,
    }
}

fn convert_scope(scope: ScopeArg) -> ExportScope {
    match scope {
        ScopeArg::All => ExportScope::All,
        ScopeArg::Filtered => ExportScope::Filtered,
        ScopeArg::Selected => ExportScope::Selected,
    }
}

fn convert_level(level: LevelArg) -> DataLevel {
    match level {
        LevelArg::Basic => DataLevel::Basic,
        LevelArg::Summary => DataLevel::Summary,
        LevelArg::Full => DataLevel::Full,
    }
}
