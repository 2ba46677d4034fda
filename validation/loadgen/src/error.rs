//! Error types for the load generator.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using LoadgenError.
pub type LoadgenResult<T> = Result<T, LoadgenError>;

/// Primary error type for load generation.
#[derive(Debug, Error)]
pub enum LoadgenError {
    // === Startup Errors ===
    #[error("Unknown scenario: {0} (expected one of: burst, sustained, spike, rampup)")]
    UnknownScenario(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config file: {0}")]
    ConfigFile(String),

    #[error("Pipeline initialization failed: {0}")]
    PipelineInit(String),

    // === Runtime Errors ===
    #[error("Worker task failed: {0}")]
    Task(String),

    // === Shutdown Errors ===
    #[error("Pipeline shutdown failed: {0}")]
    Shutdown(String),

    #[error("Pipeline shutdown exceeded {0:?}")]
    ShutdownTimeout(Duration),
}

impl LoadgenError {
    /// Whether this error must abort the process before any load is generated.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LoadgenError::Shutdown(_) | LoadgenError::ShutdownTimeout(_)
        )
    }
}

impl From<serde_yaml::Error> for LoadgenError {
    fn from(err: serde_yaml::Error) -> Self {
        LoadgenError::ConfigFile(err.to_string())
    }
}

impl From<std::io::Error> for LoadgenError {
    fn from(err: std::io::Error) -> Self {
        LoadgenError::ConfigFile(err.to_string())
    }
}

impl From<tokio::task::JoinError> for LoadgenError {
    fn from(err: tokio::task::JoinError) -> Self {
        LoadgenError::Task(err.to_string())
    }
}
