//! Error types for the worker
//!
//! The loops only need one distinction: transient failures (the network) are retried
//! after a backoff, everything else is reported and handled per mode.

use linebatch_common::LinebatchError;
use thiserror::Error;

/// Result type alias for worker operations
pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Error, Debug)]
pub enum WorkerError {
    /// Request could not be sent or its response not read
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Coordinator answered with an error status or an unusable body
    #[error("Coordinator error: {0}")]
    Coordinator(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}. Check the command-line flags and LINEBATCH_* variables.")]
    Config(String),

    #[error(transparent)]
    Common(#[from] LinebatchError),
}

impl WorkerError {
    pub fn coordinator(msg: impl Into<String>) -> Self {
        Self::Coordinator(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Worth retrying unchanged after waiting
    pub fn is_transient(&self) -> bool {
        match self {
            WorkerError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}
