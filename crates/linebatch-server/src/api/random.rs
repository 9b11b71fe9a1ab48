//! Random mode routes
//!
//! Workers pull a random pending batch and report it complete afterwards. A batch stays
//! in the pool until it is reported, so concurrent workers may receive the same batch.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use linebatch_common::protocol::{CompleteBatchResponse, RandomBatchResponse};
use serde_json::Value;

use super::{require_batch_index, require_json};
use crate::coordinator::{Coordinator, WorkAssignment};
use crate::error::AppResult;
use crate::state::Completion;

pub fn routes() -> Router<Coordinator> {
    Router::new()
        .route("/get_random_batch", get(get_random_batch))
        .route("/complete_batch", post(complete_batch))
}

/// Hand out a random pending batch
///
/// GET /get_random_batch
async fn get_random_batch(
    State(coordinator): State<Coordinator>,
) -> AppResult<Json<RandomBatchResponse>> {
    let response = match coordinator.request_work().await? {
        WorkAssignment::Assigned {
            batch_index,
            batches_left,
            lines,
        } => {
            tracing::debug!(batch_index, batches_left, "Handing out batch");
            RandomBatchResponse::Ok {
                batch_index,
                batches_left,
                lines,
            }
        },
        WorkAssignment::EndOfWork => RandomBatchResponse::Eof {
            message: Some("All batches have been processed.".to_string()),
        },
    };

    Ok(Json(response))
}

/// Remove a processed batch from the pool
///
/// POST /complete_batch {"batch_index": 17}
async fn complete_batch(
    State(coordinator): State<Coordinator>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<CompleteBatchResponse>> {
    let body = require_json(payload)?;
    let batch_index = require_batch_index(&body)?;

    let response = match coordinator.report_complete(batch_index).await? {
        Completion::Removed { remaining } => CompleteBatchResponse::Ok {
            message: format!(
                "Batch #{} removed. Remaining batches: {}",
                batch_index, remaining
            ),
            batches_left: remaining,
        },
        Completion::AlreadyRemoved => CompleteBatchResponse::AlreadyRemoved {
            message: format!("Batch #{} was already removed. Ignoring.", batch_index),
        },
    };

    Ok(Json(response))
}
