use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TshragError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Invalid time: {0:?}")]
    InvalidTime(String),

    #[error("Timed out after {timeout_ms}ms waiting for lock {}", path.display())]
    LockTimeout { path: PathBuf, timeout_ms: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TshragError>;
