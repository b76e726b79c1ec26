use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Unexpected response shape from {endpoint}: {message}")]
    SchemaError { endpoint: String, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Schema,
    Storage,
    Configuration,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::SchemaError { .. } => ErrorCategory::Schema,
            EtlError::IoError(_) => ErrorCategory::Storage,
            EtlError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            EtlError::CsvError(_) | EtlError::ProcessingError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 網路錯誤可重試
            EtlError::ApiError(_) => ErrorSeverity::Medium,
            EtlError::SchemaError { .. }
            | EtlError::CsvError(_)
            | EtlError::ProcessingError { .. } => ErrorSeverity::High,
            EtlError::IoError(_) | EtlError::InvalidConfigValueError { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::ApiError(_) => {
                "Check network connectivity and that the EBI services are up, then re-run"
                    .to_string()
            }
            EtlError::SchemaError { endpoint, .. } => format!(
                "The {} endpoint returned an unexpected payload; the upstream API may have changed",
                endpoint
            ),
            EtlError::CsvError(_) | EtlError::ProcessingError { .. } => {
                "Report content could not be serialized; re-run with --verbose for details"
                    .to_string()
            }
            EtlError::IoError(_) => {
                "Check that the output directory exists and is writable".to_string()
            }
            EtlError::InvalidConfigValueError { field, .. } => {
                format!("Fix the value passed for --{}", field.replace('_', "-"))
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::ApiError(e) => format!("An API request failed: {}", e),
            EtlError::SchemaError { endpoint, message } => {
                format!("Could not understand the {} response: {}", endpoint, message)
            }
            EtlError::CsvError(e) => format!("Failed to write report data: {}", e),
            EtlError::IoError(e) => format!("File system error: {}", e),
            EtlError::ProcessingError { message } => format!("Processing failed: {}", message),
            EtlError::InvalidConfigValueError {
                field,
                value,
                reason,
            } => format!("Bad configuration: {} = '{}' ({})", field, value, reason),
        }
    }
}
