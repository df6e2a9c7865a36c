use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{service} responded with HTTP {status}: {body}")]
    HttpStatusError {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Geocoding with {provider} failed: {message}")]
    GeocodeError { provider: String, message: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_)
            | EtlError::HttpStatusError { .. }
            | EtlError::GeocodeError { .. } => ErrorCategory::Network,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::ZipError(_) | EtlError::IoError(_) | EtlError::CacheError { .. } => {
                ErrorCategory::Storage
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::GeocodeError { .. } => ErrorSeverity::Low,
            EtlError::ApiError(_) | EtlError::CacheError { .. } => ErrorSeverity::Medium,
            EtlError::HttpStatusError { status, .. } if *status >= 500 || *status == 429 => {
                ErrorSeverity::Medium
            }
            EtlError::HttpStatusError { .. }
            | EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. } => ErrorSeverity::High,
            EtlError::ZipError(_)
            | EtlError::IoError(_)
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorSeverity::Critical,
        }
    }

    /// Whether running the same job again may succeed without any change.
    pub fn is_retryable(&self) -> bool {
        self.severity() == ErrorSeverity::Medium
    }

    /// The service rejected our credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            EtlError::HttpStatusError {
                status: 401 | 403,
                ..
            }
        )
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::ApiError(_) => {
                "Check network connectivity and that the service URL is reachable".to_string()
            }
            EtlError::HttpStatusError { status: 401, .. }
            | EtlError::HttpStatusError { status: 403, .. } => {
                "Check the API key or access token for this service".to_string()
            }
            EtlError::HttpStatusError { status: 429, .. } => {
                "Rate limited; wait a moment and run the job again".to_string()
            }
            EtlError::HttpStatusError { .. } => {
                "Inspect the response body above; the request may be malformed".to_string()
            }
            EtlError::GeocodeError { .. } => {
                "The address will be reported as failed; review it in the failed output".to_string()
            }
            EtlError::CacheError { .. } => {
                "Check SUPABASE_URL / SUPABASE_KEY and the cache table names".to_string()
            }
            EtlError::CsvError(_) | EtlError::SerializationError(_) => {
                "Check that the input file has the expected format".to_string()
            }
            EtlError::IoError(_) | EtlError::ZipError(_) => {
                "Check that the data directory exists and is writable".to_string()
            }
            EtlError::ConfigValidationError { .. } | EtlError::InvalidConfigValueError { .. } => {
                "Fix the configuration file and try again".to_string()
            }
            EtlError::MissingConfigError { field } => {
                format!("Set '{}' in the config file or the matching environment variable", field)
            }
            EtlError::ProcessingError { .. } => "Inspect the input records".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Data => format!("Bad input data: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
        }
    }

    /// Process exit code for a failed run.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        let err = EtlError::HttpStatusError {
            service: "supabase".to_string(),
            status: 503,
            body: String::new(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.exit_code(), 2);

        let err = EtlError::HttpStatusError {
            service: "mapbox".to_string(),
            status: 401,
            body: "Not Authorized".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.is_auth_failure());
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.recovery_suggestion().contains("API key"));
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = EtlError::MissingConfigError {
            field: "supabase.url".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), 3);
        assert!(err.user_friendly_message().starts_with("Configuration problem"));
    }
}
