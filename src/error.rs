use thiserror::Error;

/// Failure reported by an OS platform adapter
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{operation} is not supported on this platform")]
    Unsupported { operation: &'static str },

    #[error("Platform service unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Input injection failed: {0}")]
    Injection(String),

    #[error("No window found for '{program}'")]
    WindowNotFound { program: String },
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not determine project directories")]
    NoProjectDirs,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_message() {
        let err = AppError::InvalidInput {
            field: "interval_seconds",
            reason: "must be 10-3600".into(),
        };
        assert_eq!(err.to_string(), "Invalid interval_seconds: must be 10-3600");
    }

    #[test]
    fn test_platform_error_converts() {
        let err: AppError = PlatformError::Unsupported { operation: "focus query" }.into();
        assert!(matches!(err, AppError::Platform(_)));
        assert!(err.to_string().contains("not supported"));
    }
}
