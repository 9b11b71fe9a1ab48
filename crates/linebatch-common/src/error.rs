//! Error types for linebatch

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for linebatch operations
pub type Result<T> = std::result::Result<T, LinebatchError>;

/// Main error type for linebatch
#[derive(Error, Debug)]
pub enum LinebatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Dataset not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("Corrupt line index at record {line}: {reason}")]
    CorruptIndex { line: usize, reason: String },

    #[error("Corrupt state file {}: {reason}", .path.display())]
    CorruptState { path: PathBuf, reason: String },

    #[error("State file missing: {}", .0.display())]
    StateMissing(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl LinebatchError {
    /// Create a corrupt state error for `path`
    pub fn corrupt_state(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
