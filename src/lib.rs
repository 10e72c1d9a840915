//! scrapedash - dashboard client for a remote scraping service
//!
//! This library provides:
//! - Export engine turning job, AI job and scratcher records into JSON,
//!   CSV and XLSX files under scope and fidelity options
//! - Remote entity source and composite gathering
//! - Poll scheduling for in-flight jobs
//! - Configuration and structured logging

pub mod config;
pub mod entity;
pub mod error;
pub mod export;
pub mod logging;
pub mod poll;
pub mod remote;
pub mod utils;

// Re-export main types for convenience
pub use crate::config::AppConfig;
pub use crate::entity::{DataLevel, EntityKind};
pub use crate::error::{ScrapeDashError, ScrapeDashResult};
pub use crate::export::{run_export, ExportFile, ExportFormat, ExportManager, ExportOptions, ExportScope};
