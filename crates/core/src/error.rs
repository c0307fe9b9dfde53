// Error handling shared by the plugin crates

use thiserror::Error;

/// Errors raised while bootstrapping a plugin (configuration, logging, files)
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
