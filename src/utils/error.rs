use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

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

    #[error("Wallet API error: {message}")]
    WalletApiError { message: String },

    #[error("Load run failed: {message}")]
    RuntimeError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Io,
    Data,
    Runtime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LoadError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LoadError::HttpError(_) | LoadError::WalletApiError { .. } => ErrorCategory::Network,
            LoadError::IoError(_) => ErrorCategory::Io,
            LoadError::SerializationError(_) => ErrorCategory::Data,
            LoadError::ConfigValidationError { .. }
            | LoadError::InvalidConfigValueError { .. }
            | LoadError::MissingConfigError { .. } => ErrorCategory::Configuration,
            LoadError::RuntimeError { .. } => ErrorCategory::Runtime,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Io | ErrorCategory::Runtime => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            LoadError::HttpError(_) => {
                "Check that the wallet service is running and reachable at --base-url"
            }
            LoadError::WalletApiError { .. } => {
                "Verify the wallet exists, or pass --create-wallet to provision one"
            }
            LoadError::IoError(_) => "Check file permissions and that the output directory exists",
            LoadError::SerializationError(_) => "Inspect the response body or summary contents",
            LoadError::ConfigValidationError { .. } | LoadError::InvalidConfigValueError { .. } => {
                "Fix the configuration value and run again (see --help)"
            }
            LoadError::MissingConfigError { .. } => "Provide the missing setting on the command line or in the TOML file",
            LoadError::RuntimeError { .. } => {
                "Shorten --duration or --graceful-stop, or lower --vus and re-run with --verbose"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            LoadError::HttpError(e) if e.is_connect() => {
                "Could not connect to the wallet service".to_string()
            }
            LoadError::HttpError(e) if e.is_timeout() => {
                "The wallet service did not answer in time".to_string()
            }
            LoadError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            other => other.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = LoadError::InvalidConfigValueError {
            field: "vus".to_string(),
            value: "0".to_string(),
            reason: "Value must be at least 1".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.user_friendly_message(),
            "Invalid setting 'vus': Value must be at least 1"
        );
    }

    #[test]
    fn test_runtime_errors_are_critical() {
        let err = LoadError::RuntimeError {
            message: "worker panicked".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.exit_code(), 3);
    }
}
