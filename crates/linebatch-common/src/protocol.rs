//! Wire protocol between workers and the coordinator
//!
//! Every response body carries a `status` discriminator (`ok`, `eof`, `already_removed`,
//! `error`). End-of-work is a status of its own so callers can tell "nothing left" apart
//! from a failure without looking at HTTP codes.

use serde::{Deserialize, Serialize};

/// Wire value of `last_completed_batch` before any batch was acknowledged
pub const NO_PROGRESS: i64 = -1;

/// Response of `GET /get_random_batch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RandomBatchResponse {
    Ok {
        batch_index: u64,
        /// Pool size at selection time, the handed-out batch included
        batches_left: usize,
        lines: Vec<String>,
    },
    Eof {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        message: String,
    },
}

/// Body of `POST /complete_batch`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteBatchRequest {
    pub batch_index: u64,
}

/// Response of `POST /complete_batch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompleteBatchResponse {
    Ok { message: String, batches_left: usize },
    /// Duplicate completion under at-least-once delivery; not a failure
    AlreadyRemoved { message: String },
    Error { message: String },
}

/// Response of `GET /get_batch?batch=<n>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchResponse {
    Ok {
        lines: Vec<String>,
        next_batch_index: u64,
    },
    Eof {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        message: String,
    },
}

/// Response of `GET /get_progress`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressResponse {
    Ok { last_completed_batch: i64 },
    Error { message: String },
}

/// Body of `POST /update_progress`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProgressRequest {
    pub last_completed_batch: i64,
}

/// Body of `POST /skip_batch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipBatchRequest {
    pub batch_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Plain acknowledgement used by `update_progress` and `skip_batch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AckResponse {
    Ok { message: String },
    Error { message: String },
}

/// Snapshot returned by `GET /status` and `POST /reload`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub line_count: u64,
    pub batch_size: u64,
    pub total_batches: u64,
    pub batches_left: usize,
    pub last_completed_batch: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusResponse {
    Ok(StatusSnapshot),
    Error { message: String },
}
