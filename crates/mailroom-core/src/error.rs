use thiserror::Error;

/// Top-level error type shared across the mailroom crates.
///
/// Boundary implementations (action execution, failure persistence) report
/// through this type. The pipeline crate wraps it into its own error kinds so
/// that a failed run can be classified when it is recorded.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MailroomError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for MailroomError {
    fn from(err: toml::de::Error) -> Self {
        MailroomError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MailroomError {
    fn from(err: serde_json::Error) -> Self {
        MailroomError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for mailroom operations.
pub type Result<T> = std::result::Result<T, MailroomError>;
