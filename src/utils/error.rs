use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatusError { url: String, status: u16 },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("DuckDB error: {0}")]
    DuckDbError(#[from] duckdb::Error),

    #[error("Object storage error: {message}")]
    ObjectStoreError { message: String },

    #[error("Failed to parse {source_name} payload: {message}")]
    ParseError { source_name: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Column '{column}' not found")]
    MissingColumnError { column: String },

    #[error("Column '{column}' has type {actual}, expected {expected}")]
    TypeMismatchError {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("Value '{value}' in column '{column}' has no encoding")]
    UnknownCategoryError { column: String, value: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Storage,
    Data,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn parse(source_name: &str, message: impl Into<String>) -> Self {
        EtlError::ParseError {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) | EtlError::HttpStatusError { .. } => ErrorCategory::Network,
            EtlError::IoError(_)
            | EtlError::SqliteError(_)
            | EtlError::DuckDbError(_)
            | EtlError::ObjectStoreError { .. } => ErrorCategory::Storage,
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ParseError { .. }
            | EtlError::MissingColumnError { .. }
            | EtlError::TypeMismatchError { .. }
            | EtlError::UnknownCategoryError { .. }
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // Remote hiccups: rerunning the exercise is usually enough.
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ApiError(_) => "Check network connectivity and the endpoint URL",
            EtlError::HttpStatusError { status, .. } if *status == 401 || *status == 403 => {
                "Export API_KEY or set api.api_key in the config file"
            }
            EtlError::HttpStatusError { .. } => "Verify the endpoint URL and try again later",
            EtlError::ObjectStoreError { .. } => "Verify the bucket, key and region settings",
            EtlError::SqliteError(_) => "Make sure the SQLite file exists and holds the table",
            EtlError::DuckDbError(_) => {
                "Make sure the DuckDB file is not locked by another process"
            }
            EtlError::IoError(_) => "Check that the file exists and is readable",
            EtlError::CsvError(_) | EtlError::ParseError { .. } => {
                "Inspect the input file for malformed rows"
            }
            EtlError::MissingColumnError { .. } | EtlError::TypeMismatchError { .. } => {
                "Check the column names and types of the input data"
            }
            EtlError::UnknownCategoryError { .. } => {
                "Clean the column or extend the encoding table before encoding"
            }
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => "Review etl.toml and the CLI flags",
            EtlError::SerializationError(_) | EtlError::ProcessingError { .. } => {
                "Rerun with --verbose for more detail"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not fetch remote data: {}", self),
            ErrorCategory::Storage => format!("Storage failure: {}", self),
            ErrorCategory::Data => format!("Bad input data: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
