use thiserror::Error;

/// Error types for the scrapedash client and export engine
#[derive(Error, Debug)]
pub enum ScrapeDashError {
    // Export errors
    #[error("No entities match the current selection")]
    EmptySelection,

    #[error("Nothing to export")]
    EmptyExport,

    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Invalid {name}: {value}")]
    InvalidOption { name: String, value: String },

    #[error("File write failed: {path}")]
    FileWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // Encoding errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Network errors
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("HTTP request failed: {url} - {status}")]
    HttpRequest { url: String, status: u16 },

    // System errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeDashError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    pub fn invalid_option(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::EmptySelection | Self::EmptyExport => "selection",
            Self::UnsupportedFormat { .. } | Self::InvalidOption { .. } => "options",
            Self::FileWrite { .. } | Self::Io(_) => "system",
            Self::Serialization(_) | Self::Csv(_) | Self::Workbook(_) => "export",
            Self::Configuration { .. } => "configuration",
            Self::Network { .. } | Self::HttpRequest { .. } => "network",
        }
    }

    /// Whether the error should be shown to the user as a plain notice
    /// rather than as a failure (nothing selected, nothing to export).
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::EmptySelection | Self::EmptyExport)
    }
}

/// Result type alias for scrapedash
pub type ScrapeDashResult<T> = std::result::Result<T, ScrapeDashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(ScrapeDashError::EmptySelection.category(), "selection");
        assert_eq!(ScrapeDashError::config("bad").category(), "configuration");
        assert_eq!(
            ScrapeDashError::UnsupportedFormat { format: "pdf".to_string() }.category(),
            "options"
        );
        assert_eq!(ScrapeDashError::network("refused").category(), "network");
    }

    #[test]
    fn test_user_facing_errors() {
        assert!(ScrapeDashError::EmptySelection.is_user_facing());
        assert!(ScrapeDashError::EmptyExport.is_user_facing());
        assert!(!ScrapeDashError::network("timeout").is_user_facing());
    }

    #[test]
    fn test_error_messages() {
        let err = ScrapeDashError::UnsupportedFormat { format: "pdf".to_string() };
        assert_eq!(err.to_string(), "Unsupported format: pdf");

        let err = ScrapeDashError::HttpRequest {
            url: "https://api.example.com/jobs".to_string(),
            status: 503,
        };
        assert!(err.to_string().contains("503"));
    }
}
