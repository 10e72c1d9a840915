use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::entity::DataLevel;
use crate::export::{ExportFormat, ExportScope};
use crate::logging::LoggingConfig;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub export: ExportConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

/// Remote scraping service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub default_format: String,
    pub default_scope: ExportScope,
    pub default_data_level: DataLevel,
    pub output_directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub active_interval_ms: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = get_data_directory();

        Self {
            api: ApiConfig {
                base_url: "http://localhost:8000/api/".to_string(),
                api_key: None,
                request_timeout_seconds: 30,
            },
            export: ExportConfig {
                default_format: "csv".to_string(),
                default_scope: ExportScope::All,
                default_data_level: DataLevel::Summary,
                output_directory: data_dir.join("exports"),
            },
            polling: PollingConfig::default(),
            logging: LoggingConfig {
                log_directory: data_dir.join("logs"),
                ..LoggingConfig::default()
            },
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            active_interval_ms: 3_000,
            backoff_initial_ms: 5_000,
            backoff_max_ms: 60_000,
        }
    }
}

impl AppConfig {
    /// Load configuration from default locations
    pub async fn load() -> Result<Self> {
        let config_path = get_config_path();

        let mut config = if config_path.exists() {
            Self::read_file(&config_path).await?
        } else {
            info!("No configuration file found, using defaults");
            let config = Self::default();
            config.save().await?;
            config
        };

        ConfigOverrides::apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub async fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let mut config = Self::read_file(path.as_ref()).await?;

        ConfigOverrides::apply(&mut config);
        config.validate()?;

        info!("Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    async fn read_file(path: &std::path::Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to default location
    pub async fn save(&self) -> Result<()> {
        let config_path = get_config_path();

        // Ensure config directory exists
        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(&config_path, content).await?;

        info!("Configuration saved to: {}", config_path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("API base_url must not be empty"));
        }
        url::Url::parse(&self.api.base_url)
            .map_err(|e| anyhow::anyhow!("API base_url is not a valid URL: {}", e))?;

        if self.api.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("API request_timeout_seconds must be > 0"));
        }

        self.export
            .default_format
            .parse::<ExportFormat>()
            .map_err(|e| anyhow::anyhow!("Export default_format: {}", e))?;

        if self.polling.active_interval_ms == 0 {
            return Err(anyhow::anyhow!("Polling active_interval_ms must be > 0"));
        }

        if self.polling.backoff_initial_ms == 0
            || self.polling.backoff_initial_ms > self.polling.backoff_max_ms
        {
            return Err(anyhow::anyhow!(
                "Polling backoff must satisfy 0 < backoff_initial_ms <= backoff_max_ms"
            ));
        }

        Ok(())
    }
}

/// Get the default data directory
fn get_data_directory() -> PathBuf {
    directories::ProjectDirs::from("com", "scrapedash", "scrapedash")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("data"))
}

/// Get the configuration file path
fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "scrapedash", "scrapedash")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join("config.toml"))
}

/// Environment-based configuration overrides
pub struct ConfigOverrides;

impl ConfigOverrides {
    /// Apply environment variable overrides to configuration
    pub fn apply(config: &mut AppConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    fn apply_from(config: &mut AppConfig, var: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = var("SCRAPEDASH_API_URL") {
            config.api.base_url = base_url;
        }

        if let Some(api_key) = var("SCRAPEDASH_API_KEY") {
            config.api.api_key = Some(api_key);
        }

        if let Some(output_dir) = var("SCRAPEDASH_OUTPUT_DIR") {
            config.export.output_directory = PathBuf::from(output_dir);
        }

        if let Some(format) = var("SCRAPEDASH_EXPORT_FORMAT") {
            config.export.default_format = format;
        }

        if let Some(log_level) = var("SCRAPEDASH_LOG_LEVEL") {
            config.logging.level = log_level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.export.default_scope, ExportScope::All);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.export.default_format = "pdf".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.polling.backoff_initial_ms = 120_000;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SCRAPEDASH_API_URL", "https://scrape.example.com/v1/"),
            ("SCRAPEDASH_EXPORT_FORMAT", "xlsx"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        ConfigOverrides::apply_from(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.base_url, "https://scrape.example.com/v1/");
        assert_eq!(config.export.default_format, "xlsx");
        assert!(config.api.api_key.is_none());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut config = AppConfig::default();
        config.export.default_data_level = DataLevel::Full;
        config.api.api_key = Some("secret".to_string());

        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = AppConfig::load_from_file(file.path()).await.unwrap();
        assert_eq!(loaded.export.default_data_level, DataLevel::Full);
        assert_eq!(loaded.polling.active_interval_ms, 3_000);
    }
}
