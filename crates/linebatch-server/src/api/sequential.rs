//! Sequential mode routes
//!
//! The worker drives the cursor: it reads progress, asks for `progress + 1`, and writes
//! progress back after processing. `get_batch` itself never changes state.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use linebatch_common::protocol::{AckResponse, BatchResponse, ProgressResponse};
use serde::Deserialize;
use serde_json::Value;

use super::{require_batch_index, require_json};
use crate::coordinator::Coordinator;
use crate::error::{AppError, AppResult};

pub fn routes() -> Router<Coordinator> {
    Router::new()
        .route("/get_progress", get(get_progress))
        .route("/update_progress", post(update_progress))
        .route("/get_batch", get(get_batch))
        .route("/skip_batch", post(skip_batch))
}

#[derive(Debug, Deserialize)]
struct BatchQuery {
    batch: Option<String>,
}

/// GET /get_progress
async fn get_progress(State(coordinator): State<Coordinator>) -> AppResult<Json<ProgressResponse>> {
    Ok(Json(ProgressResponse::Ok {
        last_completed_batch: coordinator.fetch_progress()?,
    }))
}

/// Overwrite the last completed batch
///
/// POST /update_progress {"last_completed_batch": 5}
async fn update_progress(
    State(coordinator): State<Coordinator>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<AckResponse>> {
    let body = require_json(payload)?;
    let value = body
        .get("last_completed_batch")
        .ok_or_else(|| AppError::bad_request("Parameter 'last_completed_batch' is missing"))?;

    // Numeric strings are accepted as well as integers
    let last_completed_batch = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::bad_request("Invalid value for 'last_completed_batch'"))?;

    coordinator.set_progress(last_completed_batch).await?;

    Ok(Json(AckResponse::Ok {
        message: format!("Progress set to batch #{}.", last_completed_batch),
    }))
}

/// Read one batch by index
///
/// GET /get_batch?batch=6
async fn get_batch(
    State(coordinator): State<Coordinator>,
    query: Result<Query<BatchQuery>, QueryRejection>,
) -> AppResult<Json<BatchResponse>> {
    let Query(query) = query.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    let raw = query
        .batch
        .ok_or_else(|| AppError::bad_request("Parameter 'batch' is missing."))?;
    let batch_index = raw.trim().parse::<u64>().map_err(|_| {
        AppError::bad_request("Invalid 'batch' parameter. Must be a non-negative integer.")
    })?;

    let response = match coordinator.request_batch(batch_index).await? {
        Some(lines) => BatchResponse::Ok {
            lines,
            next_batch_index: batch_index.saturating_add(1),
        },
        None => BatchResponse::Eof {
            message: Some("End of dataset reached or batch index too high.".to_string()),
        },
    };

    Ok(Json(response))
}

/// Force the cursor past a batch that cannot be processed
///
/// POST /skip_batch {"batch_index": 7, "reason": "embedder rejects record"}
async fn skip_batch(
    State(coordinator): State<Coordinator>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<AckResponse>> {
    let body = require_json(payload)?;
    let batch_index = require_batch_index(&body)?;
    let reason = match body.get("reason") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(reason)) => reason.clone(),
        Some(_) => return Err(AppError::bad_request("Parameter 'reason' must be a string")),
    };

    coordinator.skip_batch(batch_index, reason).await?;

    Ok(Json(AckResponse::Ok {
        message: format!("Batch #{} skipped.", batch_index),
    }))
}
