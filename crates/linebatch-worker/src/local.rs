//! Single-process ingest without a coordinator
//!
//! Streams a dataset file in fixed-size chunks of lines through the same pipeline the
//! coordinated modes use. There is no progress state; a rerun starts from the top and
//! overwrites points by id.

use linebatch_common::LinebatchError;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use crate::error::{Result, WorkerError};
use crate::pipeline::{BatchOutcome, BatchProcessor, Embedder, VectorStore};
use crate::runner::{self, RunSummary, RunnerConfig, StopReason};

/// Lines per chunk
pub const DEFAULT_LOCAL_BATCH_SIZE: usize = 128;

/// Ingest `dataset` from the first line to the last
pub async fn run_local<E, S>(
    processor: &BatchProcessor<E, S>,
    dataset: &Path,
    batch_size: usize,
    config: &RunnerConfig,
) -> Result<RunSummary>
where
    E: Embedder,
    S: VectorStore,
{
    if batch_size == 0 {
        return Err(WorkerError::config("--batch-size must be greater than 0"));
    }

    let file = File::open(dataset).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => LinebatchError::DatasetNotFound(dataset.to_path_buf()),
        _ => LinebatchError::Io(e),
    })?;
    let mut reader = BufReader::new(file);
    info!(dataset = %dataset.display(), batch_size, "Starting local ingest");

    let mut summary = RunSummary::new();
    let mut chunk_index = 0u64;

    loop {
        if summary.limit_reached(config) {
            summary.stopped = StopReason::BatchLimit;
            return Ok(summary);
        }

        let lines = read_chunk(&mut reader, batch_size).await?;
        if lines.is_empty() {
            info!(
                batches = summary.batches,
                records = summary.records,
                "Dataset fully ingested"
            );
            return Ok(summary);
        }

        let outcome = process_with_retry(processor, chunk_index, &lines, config).await?;
        summary.batches += 1;
        summary.records += outcome.upserted;
        chunk_index += 1;
    }
}

/// Retries network failures; anything else ends the ingest
async fn process_with_retry<E, S>(
    processor: &BatchProcessor<E, S>,
    chunk_index: u64,
    lines: &[String],
    config: &RunnerConfig,
) -> Result<BatchOutcome>
where
    E: Embedder,
    S: VectorStore,
{
    loop {
        match processor.process(chunk_index, lines).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_transient() => runner::backoff(&e, config).await,
            Err(e) => return Err(e),
        }
    }
}

/// Up to `size` non-blank lines, terminators stripped
async fn read_chunk<R>(reader: &mut R, size: usize) -> Result<Vec<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::with_capacity(size);
    let mut buf = Vec::new();

    while lines.len() < size {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(LinebatchError::from)?;
        if read == 0 {
            break;
        }

        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        if !buf.is_empty() {
            lines.push(String::from_utf8_lossy(&buf).into_owned());
        }
    }

    Ok(lines)
}
