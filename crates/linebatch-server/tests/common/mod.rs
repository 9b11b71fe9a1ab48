//! Shared helpers for coordinator integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use linebatch_server::{api, config::Config, coordinator::Coordinator};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

/// Dataset plus state directory living in one temp dir
pub struct TestDataset {
    pub dir: TempDir,
    pub dataset: PathBuf,
}

impl TestDataset {
    /// `lines` records of the form `{"id":<n>,"title":"Paper <n>"}`
    pub fn with_lines(lines: usize) -> Self {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("arxiv.jsonl");
        let body: String = (0..lines)
            .map(|i| format!("{{\"id\":{},\"title\":\"Paper {}\"}}\n", i, i))
            .collect();
        std::fs::write(&dataset, body).unwrap();
        Self { dir, dataset }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn config(&self, batch_size: u64) -> Config {
        Config::for_dataset(&self.dataset, self.state_dir(), batch_size)
    }

    /// Open a coordinator over the dataset, as a fresh process would
    pub fn app(&self, batch_size: u64) -> Router {
        api::router(Coordinator::open(&self.config(batch_size)).unwrap())
    }

    pub fn state_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.state_dir().join(name)).unwrap()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: &Router, uri: &str, body: impl Into<String>) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.into()))
            .unwrap(),
    )
    .await
}
