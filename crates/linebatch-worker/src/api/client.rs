//! HTTP client for the coordinator
//!
//! Error statuses arrive as protocol bodies (often with a 4xx/5xx code) and are returned
//! as such; only bodies that do not parse become [`WorkerError::Coordinator`].

use linebatch_common::protocol::{
    AckResponse, BatchResponse, CompleteBatchRequest, CompleteBatchResponse, ProgressResponse,
    RandomBatchResponse, SkipBatchRequest, StatusResponse, UpdateProgressRequest,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::api::endpoints;
use crate::error::{Result, WorkerError};

/// Default coordinator URL
pub const DEFAULT_COORDINATOR_URL: &str = "http://localhost:8000";

/// Default timeout for coordinator requests in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct CoordinatorClient {
    client: Client,
    base_url: String,
}

impl CoordinatorClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Share an existing connection pool
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_random_batch(&self) -> Result<RandomBatchResponse> {
        let url = endpoints::random_batch_url(&self.base_url);
        self.send(self.client.get(&url)).await
    }

    pub async fn complete_batch(&self, batch_index: u64) -> Result<CompleteBatchResponse> {
        let url = endpoints::complete_batch_url(&self.base_url);
        let request = CompleteBatchRequest { batch_index };
        self.send(self.client.post(&url).json(&request)).await
    }

    pub async fn get_progress(&self) -> Result<ProgressResponse> {
        let url = endpoints::progress_url(&self.base_url);
        self.send(self.client.get(&url)).await
    }

    pub async fn update_progress(&self, last_completed_batch: i64) -> Result<AckResponse> {
        let url = endpoints::update_progress_url(&self.base_url);
        let request = UpdateProgressRequest { last_completed_batch };
        self.send(self.client.post(&url).json(&request)).await
    }

    pub async fn get_batch(&self, batch_index: u64) -> Result<BatchResponse> {
        let url = endpoints::batch_url(&self.base_url, batch_index);
        self.send(self.client.get(&url)).await
    }

    pub async fn skip_batch(&self, batch_index: u64, reason: Option<String>) -> Result<AckResponse> {
        let url = endpoints::skip_batch_url(&self.base_url);
        let request = SkipBatchRequest { batch_index, reason };
        self.send(self.client.post(&url).json(&request)).await
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        let url = endpoints::status_url(&self.base_url);
        self.send(self.client.get(&url)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        match serde_json::from_slice::<T>(&bytes) {
            Ok(body) => Ok(body),
            Err(_) if !status.is_success() => Err(WorkerError::coordinator(format!(
                "HTTP {}: {}",
                status,
                String::from_utf8_lossy(&bytes).trim()
            ))),
            Err(e) => Err(WorkerError::coordinator(format!("unexpected response body: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    async fn client_for(server: &MockServer) -> CoordinatorClient {
        CoordinatorClient::new(format!("{}/", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_batch_parses_ok_and_eof() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get_batch"))
            .and(query_param("batch", "6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"status": "ok", "lines": ["{}"], "next_batch_index": 7}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/get_batch"))
            .and(query_param("batch", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "eof"})))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(
            client.get_batch(6).await.unwrap(),
            BatchResponse::Ok {
                lines: vec!["{}".to_string()],
                next_batch_index: 7
            }
        );
        assert!(matches!(
            client.get_batch(7).await.unwrap(),
            BatchResponse::Eof { .. }
        ));
    }

    #[tokio::test]
    async fn test_error_body_with_error_code_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/complete_batch"))
            .and(body_json(json!({"batch_index": 3})))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"status": "error", "message": "disk full"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(
            client.complete_batch(3).await.unwrap(),
            CompleteBatchResponse::Error {
                message: "disk full".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_non_protocol_error_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get_progress"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.get_progress().await.unwrap_err();
        assert!(matches!(err, WorkerError::Coordinator(ref m) if m.contains("502")));
        assert!(!err.is_transient());
    }
}
