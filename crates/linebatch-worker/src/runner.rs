//! Worker loops for both distribution modes
//!
//! Random mode never gives up: anything short of end-of-work is logged, waited out and
//! retried, and an unfinished batch simply stays in the pool. Sequential mode owns the
//! cursor, so it only retries network failures and stops on anything else.

use linebatch_common::protocol::{
    AckResponse, BatchResponse, CompleteBatchResponse, ProgressResponse, RandomBatchResponse,
};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::api::CoordinatorClient;
use crate::error::{Result, WorkerError};
use crate::pipeline::{BatchProcessor, Embedder, VectorStore};

pub const DEFAULT_NETWORK_BACKOFF_SECS: u64 = 60;
pub const DEFAULT_SERVER_ERROR_BACKOFF_SECS: u64 = 5;
pub const DEFAULT_FAILURE_BACKOFF_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Wait after the coordinator or a collaborator was unreachable
    pub network_backoff: Duration,
    /// Wait after the coordinator answered with an error status
    pub server_error_backoff: Duration,
    /// Wait after a batch failed to process (random mode)
    pub failure_backoff: Duration,
    /// Stop after this many completed batches
    pub max_batches: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            network_backoff: Duration::from_secs(DEFAULT_NETWORK_BACKOFF_SECS),
            server_error_backoff: Duration::from_secs(DEFAULT_SERVER_ERROR_BACKOFF_SECS),
            failure_backoff: Duration::from_secs(DEFAULT_FAILURE_BACKOFF_SECS),
            max_batches: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfWork,
    BatchLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub batches: u64,
    pub records: usize,
    pub stopped: StopReason,
}

impl RunSummary {
    pub(crate) fn new() -> Self {
        Self {
            batches: 0,
            records: 0,
            stopped: StopReason::EndOfWork,
        }
    }

    pub(crate) fn limit_reached(&self, config: &RunnerConfig) -> bool {
        config.max_batches.is_some_and(|max| self.batches >= max)
    }
}

/// Pull random batches until the pool is empty
pub async fn run_random<E, S>(
    client: &CoordinatorClient,
    processor: &BatchProcessor<E, S>,
    config: &RunnerConfig,
) -> Result<RunSummary>
where
    E: Embedder,
    S: VectorStore,
{
    let mut summary = RunSummary::new();

    loop {
        if summary.limit_reached(config) {
            summary.stopped = StopReason::BatchLimit;
            return Ok(summary);
        }

        let (batch_index, batches_left, lines) = match client.get_random_batch().await {
            Ok(RandomBatchResponse::Ok {
                batch_index,
                batches_left,
                lines,
            }) if !lines.is_empty() => (batch_index, batches_left, lines),
            Ok(RandomBatchResponse::Ok { batch_index, .. }) => {
                warn!(batch_index, "Coordinator sent an empty batch, retrying");
                sleep(config.server_error_backoff).await;
                continue;
            },
            Ok(RandomBatchResponse::Eof { .. }) => {
                info!(batches = summary.batches, "Coordinator has no more batches");
                return Ok(summary);
            },
            Ok(RandomBatchResponse::Error { message }) => {
                warn!(%message, "Coordinator returned an error");
                sleep(config.server_error_backoff).await;
                continue;
            },
            Err(e) => {
                backoff(&e, config).await;
                continue;
            },
        };

        info!(batch_index, batches_left, "Processing batch");

        let outcome = match processor.process(batch_index, &lines).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_transient() => {
                backoff(&e, config).await;
                continue;
            },
            Err(e) => {
                error!(batch_index, error = %e, "Batch failed, it stays in the pool");
                sleep(config.failure_backoff).await;
                continue;
            },
        };

        match client.complete_batch(batch_index).await {
            Ok(CompleteBatchResponse::Ok { batches_left, .. }) => {
                info!(batch_index, batches_left, "Reported batch complete");
            },
            Ok(CompleteBatchResponse::AlreadyRemoved { .. }) => {
                info!(batch_index, "Batch was already completed by another worker");
            },
            Ok(CompleteBatchResponse::Error { message }) => {
                warn!(batch_index, %message, "Completion rejected, batch will be handed out again");
                sleep(config.server_error_backoff).await;
                continue;
            },
            Err(e) => {
                backoff(&e, config).await;
                continue;
            },
        }

        summary.batches += 1;
        summary.records += outcome.upserted;
    }
}

/// Walk the dataset from the cursor (or `start`) until end of data
pub async fn run_sequential<E, S>(
    client: &CoordinatorClient,
    processor: &BatchProcessor<E, S>,
    config: &RunnerConfig,
    start: Option<u64>,
) -> Result<RunSummary>
where
    E: Embedder,
    S: VectorStore,
{
    let mut current = match start {
        Some(start) => start,
        None => starting_batch(client).await,
    };
    info!(batch_index = current, "Starting sequential run");

    let mut summary = RunSummary::new();

    loop {
        if summary.limit_reached(config) {
            summary.stopped = StopReason::BatchLimit;
            return Ok(summary);
        }

        let lines = match client.get_batch(current).await {
            Ok(BatchResponse::Ok { lines, .. }) if lines.is_empty() => {
                return Err(WorkerError::coordinator(format!(
                    "batch #{} is empty but not end of data",
                    current
                )))
            },
            Ok(BatchResponse::Ok { lines, .. }) => lines,
            Ok(BatchResponse::Eof { .. }) => {
                info!(batches = summary.batches, "End of dataset reached");
                return Ok(summary);
            },
            Ok(BatchResponse::Error { message }) => return Err(WorkerError::Coordinator(message)),
            Err(e) if e.is_transient() => {
                backoff(&e, config).await;
                continue;
            },
            Err(e) => return Err(e),
        };

        let outcome = match processor.process(current, &lines).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_transient() => {
                backoff(&e, config).await;
                continue;
            },
            Err(e) => {
                error!(batch_index = current, error = %e, "Batch failed, stopping");
                return Err(e);
            },
        };

        let marker = i64::try_from(current)
            .map_err(|_| WorkerError::coordinator(format!("batch index {} too large", current)))?;
        match client.update_progress(marker).await {
            Ok(AckResponse::Ok { .. }) => {},
            Ok(AckResponse::Error { message }) => return Err(WorkerError::Coordinator(message)),
            // Progress was not recorded; the batch is processed again, which is idempotent
            Err(e) if e.is_transient() => {
                backoff(&e, config).await;
                continue;
            },
            Err(e) => return Err(e),
        }

        summary.batches += 1;
        summary.records += outcome.upserted;
        current += 1;
    }
}

/// Next batch according to the coordinator, or 0 when it cannot tell
async fn starting_batch(client: &CoordinatorClient) -> u64 {
    match client.get_progress().await {
        Ok(ProgressResponse::Ok {
            last_completed_batch,
        }) => u64::try_from(last_completed_batch.saturating_add(1)).unwrap_or(0),
        Ok(ProgressResponse::Error { message }) => {
            warn!(%message, "Could not load progress, starting at batch 0");
            0
        },
        Err(e) => {
            warn!(error = %e, "Could not load progress, starting at batch 0");
            0
        },
    }
}

pub(crate) async fn backoff(error: &WorkerError, config: &RunnerConfig) {
    let wait = if error.is_transient() {
        config.network_backoff
    } else {
        config.server_error_backoff
    };
    warn!(error = %error, wait_secs = wait.as_secs(), "Request failed, retrying");
    sleep(wait).await;
}
