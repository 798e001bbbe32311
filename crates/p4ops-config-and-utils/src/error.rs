//! Error types for configuration and setup.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// e.g. no home directory
    #[error("Path error: {0}")]
    Path(String),

    #[error(transparent)]
    Client(#[from] p4_cli_ops::P4CliOpsError),
}

pub type CoreResult<T> = Result<T, CoreError>;
