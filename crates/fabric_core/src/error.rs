//! Error types for the core module.

use thiserror::Error;

use fabric_net::AllocationError;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid trusted principal: {0}")]
    InvalidPrincipal(String),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Work queue closed")]
    QueueClosed,

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
