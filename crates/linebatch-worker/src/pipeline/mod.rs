//! Batch processing: parse, sanitize, embed, upsert

pub mod embedder;
pub mod record;
pub mod store;

pub use embedder::{Embedder, HttpEmbedder};
pub use record::{prepare_batch, PreparedBatch, PreparedRecord};
pub use store::{Point, QdrantStore, SearchHit, VectorStore};

use linebatch_common::sanitize::Sanitizer;
use tracing::info;

use crate::error::{Result, WorkerError};

/// What one batch amounted to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub upserted: usize,
    pub skipped: usize,
}

/// Processes the lines of one batch end to end
pub struct BatchProcessor<E, S> {
    embedder: E,
    store: S,
    sanitizer: Sanitizer,
    source_type: String,
}

impl<E: Embedder, S: VectorStore> BatchProcessor<E, S> {
    pub fn new(embedder: E, store: S, source_type: impl Into<String>) -> Result<Self> {
        Ok(Self {
            embedder,
            store,
            sanitizer: Sanitizer::new()?,
            source_type: source_type.into(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// A batch without usable records succeeds with nothing upserted
    pub async fn process(&self, batch_index: u64, lines: &[String]) -> Result<BatchOutcome> {
        let prepared = prepare_batch(lines, &self.sanitizer, &self.source_type)?;
        let skipped = prepared.malformed + prepared.incomplete;

        if prepared.records.is_empty() {
            info!(batch_index, skipped, "No usable records in batch");
            return Ok(BatchOutcome { upserted: 0, skipped });
        }

        let texts: Vec<String> = prepared.records.iter().map(|r| r.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != prepared.records.len() {
            return Err(WorkerError::embedding(format!(
                "expected {} vectors, got {}",
                prepared.records.len(),
                vectors.len()
            )));
        }

        let points: Vec<Point> = prepared
            .records
            .into_iter()
            .zip(vectors)
            .map(|(record, vector)| Point {
                id: record.id,
                vector,
                payload: record.payload,
            })
            .collect();
        let upserted = points.len();
        self.store.upsert(points).await?;

        info!(batch_index, upserted, skipped, "Batch stored");
        Ok(BatchOutcome { upserted, skipped })
    }
}
