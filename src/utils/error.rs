use thiserror::Error;

/// 單一來源抓取失敗，不會中止整次編譯
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to fetch {url}: HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("Source '{name}' not available in cache: {reason}")]
    CacheMiss { name: String, reason: String },
}

#[derive(Error, Debug)]
pub enum YahaError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Staging record error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    FetchError(#[from] FetchError),

    #[error("Configuration missing: {path} not found")]
    ConfigMissing { path: String },

    #[error("Invalid configuration for '{field}': {message}")]
    ConfigInvalid { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Processing error in {stage}: {message}")]
    ProcessingError { stage: String, message: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Processing,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl YahaError {
    pub fn config_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        YahaError::ConfigInvalid {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn processing(stage: impl Into<String>, message: impl Into<String>) -> Self {
        YahaError::ProcessingError {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            YahaError::ConfigMissing { .. }
            | YahaError::ConfigInvalid { .. }
            | YahaError::InvalidConfigValue { .. } => ErrorCategory::Configuration,
            YahaError::HttpError(_) | YahaError::FetchError(_) => ErrorCategory::Network,
            YahaError::CsvError(_) | YahaError::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
            YahaError::IoError(_)
            | YahaError::SerializationError(_)
            | YahaError::CacheError { .. } => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            YahaError::ConfigMissing { .. } => {
                "Create the source list (a JSON array of {\"name\", \"url\"} objects) or point --config at the right paths"
            }
            YahaError::ConfigInvalid { .. } | YahaError::InvalidConfigValue { .. } => {
                "Fix the reported field in the configuration file and run again"
            }
            YahaError::HttpError(_) | YahaError::FetchError(_) => {
                "Check network connectivity and the source URL, then retry"
            }
            YahaError::CacheError { .. } => {
                "Run once without --compile-only to populate the source cache"
            }
            YahaError::CsvError(_) | YahaError::ProcessingError { .. } => {
                "Remove the temporary work files and run again"
            }
            YahaError::IoError(_) | YahaError::SerializationError(_) => {
                "Check file permissions and free disk space"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Processing => format!("Compilation failed: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
        }
    }

    /// 依嚴重程度對應程序退出碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, YahaError>;
