//! Embedding producer
//!
//! [`HttpEmbedder`] speaks the text-embeddings-inference contract: `POST {"inputs": [..]}`
//! answered with one vector per input.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, WorkerError};

/// Prefix the retrieval model expects on indexed documents
pub const DEFAULT_PASSAGE_PREFIX: &str = "passage: ";

/// Prefix the retrieval model expects on search queries
pub const DEFAULT_QUERY_PREFIX: &str = "query: ";

/// Texts per embedding request
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

pub const DEFAULT_EMBEDDER_URL: &str = "http://localhost:8080/embed";

/// Produces one fixed-length vector per input text, in input order
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Vector for a search query, embedded like a document unless overridden
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| WorkerError::embedding("no vector returned for query"))
    }
}

#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: Client,
    url: String,
    passage_prefix: String,
    query_prefix: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

impl HttpEmbedder {
    pub fn new(
        client: Client,
        url: impl Into<String>,
        passage_prefix: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            passage_prefix: passage_prefix.into(),
            query_prefix: DEFAULT_QUERY_PREFIX.to_string(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn with_query_prefix(mut self, query_prefix: impl Into<String>) -> Self {
        self.query_prefix = query_prefix.into();
        self
    }

    async fn embed_chunk(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { inputs })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::embedding(format!("HTTP {}: {}", status, body.trim())));
        }

        let vectors: Vec<Vec<f32>> = response.json().await?;
        if vectors.len() != inputs.len() {
            return Err(WorkerError::embedding(format!(
                "expected {} vectors, got {}",
                inputs.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let inputs: Vec<String> = chunk
                .iter()
                .map(|text| format!("{}{}", self.passage_prefix, text))
                .collect();
            vectors.extend(self.embed_chunk(&inputs).await?);
        }

        debug!(texts = texts.len(), "Embedded texts");
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let input = vec![format!("{}{}", self.query_prefix, text)];
        let mut vectors = self.embed_chunk(&input).await?;
        vectors
            .pop()
            .ok_or_else(|| WorkerError::embedding("no vector returned for query"))
    }
}
