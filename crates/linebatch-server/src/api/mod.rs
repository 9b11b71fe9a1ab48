//! HTTP surface of the coordinator
//!
//! Every body carries a `status` field. Input errors are 400, coordinator failures 500,
//! both with `{"status": "error", "message": ...}`. End of work is `status: "eof"` on a
//! 200 response.

pub mod random;
pub mod sequential;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use linebatch_common::protocol::StatusResponse;
use serde_json::{json, Value};

use crate::coordinator::Coordinator;
use crate::error::{AppError, AppResult};
use crate::middleware;

/// Create the application router with all routes and middleware
pub fn router(coordinator: Coordinator) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/reload", post(reload))
        .merge(random::routes())
        .merge(sequential::routes())
        .with_state(coordinator)
        // Apply layers from innermost to outermost
        .layer(middleware::compression_layer())
        .layer(middleware::tracing_layer())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// GET /status
async fn status(State(coordinator): State<Coordinator>) -> AppResult<Json<StatusResponse>> {
    Ok(Json(StatusResponse::Ok(coordinator.status()?)))
}

/// Re-read pool and cursor from disk
///
/// POST /reload
async fn reload(State(coordinator): State<Coordinator>) -> AppResult<Json<StatusResponse>> {
    let snapshot = coordinator.reload_state().await?;
    tracing::info!(
        batches_left = snapshot.batches_left,
        last_completed_batch = snapshot.last_completed_batch,
        "State reloaded from disk"
    );
    Ok(Json(StatusResponse::Ok(snapshot)))
}

fn require_json(payload: Result<Json<Value>, JsonRejection>) -> AppResult<Value> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// `batch_index` as a non-negative integer; numeric strings are accepted
fn require_batch_index(body: &Value) -> AppResult<u64> {
    let value = body
        .get("batch_index")
        .ok_or_else(|| AppError::bad_request("Parameter 'batch_index' is missing."))?;

    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        AppError::bad_request("Invalid 'batch_index'. Must be a non-negative integer.")
    })
}
