//! Vector store
//!
//! Points are keyed by the deterministic record id, so upserting a batch twice (at-least-
//! once delivery) overwrites instead of duplicating. [`QdrantStore`] uses the Qdrant REST API.

use async_trait::async_trait;
use linebatch_common::record::RecordPayload;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{Result, WorkerError};

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_COLLECTION: &str = "idea-db";
pub const DEFAULT_VECTOR_SIZE: usize = 768;

/// Hits returned by a search unless asked otherwise
pub const DEFAULT_SEARCH_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: RecordPayload,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection with cosine distance unless it already exists
    async fn ensure_collection(&self, vector_size: usize) -> Result<()>;

    /// Insert or overwrite points by id
    async fn upsert(&self, points: Vec<Point>) -> Result<()>;

    /// Nearest neighbours of `vector`, best first
    async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<SearchHit>>;
}

/// One nearest-neighbour match
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    /// Numeric or UUID, depending on who wrote the point
    pub id: Value,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Serialize)]
struct SearchRequest {
    vector: Vec<f32>,
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Debug, Clone)]
pub struct QdrantStore {
    client: Client,
    base_url: String,
    collection: String,
}

impl QdrantStore {
    pub fn new(client: Client, base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }
}

async fn check(response: Response, action: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(WorkerError::store(format!("{} failed with HTTP {}: {}", action, status, body.trim())))
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, vector_size: usize) -> Result<()> {
        let url = self.collection_url();

        let existing = self.client.get(&url).send().await?;
        if existing.status() != StatusCode::NOT_FOUND {
            check(existing, "collection lookup").await?;
            debug!(collection = %self.collection, "Collection exists");
            return Ok(());
        }

        info!(collection = %self.collection, vector_size, "Creating collection");
        let body = json!({ "vectors": { "size": vector_size, "distance": "Cosine" } });
        let response = self.client.put(&url).json(&body).send().await?;
        check(response, "collection creation").await
    }

    async fn upsert(&self, points: Vec<Point>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let count = points.len();
        let url = format!("{}/points?wait=true", self.collection_url());
        let response = self
            .client
            .put(&url)
            .json(&json!({ "points": points }))
            .send()
            .await?;
        check(response, "upsert").await?;

        debug!(collection = %self.collection, points = count, "Upserted points");
        Ok(())
    }

    async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<SearchHit>> {
        let url = format!("{}/points/search", self.collection_url());
        let request = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::store(format!(
                "search failed with HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        let body: SearchResponse = response.json().await?;
        debug!(collection = %self.collection, hits = body.result.len(), "Search done");
        Ok(body.result)
    }
}
