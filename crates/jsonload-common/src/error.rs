//! Error types shared across jsonload crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while setting up the process (environment, logging)
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidEnv {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid log setting: {0}")]
    InvalidLogSetting(String),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

impl CommonError {
    /// Create an invalid environment variable error
    pub fn invalid_env(
        name: impl Into<String>,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::InvalidEnv {
            name: name.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
