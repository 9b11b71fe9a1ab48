//! Worker loops against a mocked coordinator

use async_trait::async_trait;
use linebatch_worker::api::CoordinatorClient;
use linebatch_worker::pipeline::{BatchProcessor, Embedder, Point, SearchHit, VectorStore};
use linebatch_worker::runner::{run_random, run_sequential, RunnerConfig, StopReason};
use linebatch_worker::{Result, WorkerError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fails the first `failures` calls, then returns one-element vectors
#[derive(Default)]
struct FakeEmbedder {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(WorkerError::embedding("model not loaded"));
        }
        Ok(texts.iter().map(|_| vec![0.5]).collect())
    }
}

#[derive(Default)]
struct RecordingStore {
    points: Mutex<Vec<Point>>,
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn ensure_collection(&self, _vector_size: usize) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, points: Vec<Point>) -> Result<()> {
        self.points.lock().unwrap().extend(points);
        Ok(())
    }

    async fn search(&self, _vector: Vec<f32>, _limit: usize) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }
}

fn no_wait() -> RunnerConfig {
    RunnerConfig {
        network_backoff: Duration::ZERO,
        server_error_backoff: Duration::ZERO,
        failure_backoff: Duration::ZERO,
        max_batches: None,
    }
}

fn processor(embedder: FakeEmbedder) -> BatchProcessor<FakeEmbedder, RecordingStore> {
    BatchProcessor::new(embedder, RecordingStore::default(), "arXiv").unwrap()
}

fn client(server: &MockServer) -> CoordinatorClient {
    CoordinatorClient::new(server.uri(), Duration::from_secs(5)).unwrap()
}

fn lines(ids: &[&str]) -> Vec<String> {
    ids.iter()
        .map(|id| json!({"id": id, "title": format!("Title {}", id), "abstract": "Body"}).to_string())
        .collect()
}

async fn mount_eof(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "eof"})))
        .with_priority(10)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_random_processes_until_eof() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/get_random_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "batch_index": 4,
            "batches_left": 2,
            "lines": lines(&["a", "b"]),
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get_random_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "batch_index": 7,
            "batches_left": 1,
            "lines": lines(&["c"]),
        })))
        .up_to_n_times(1)
        .with_priority(2)
        .mount(&server)
        .await;
    mount_eof(&server, "/get_random_batch").await;

    Mock::given(method("POST"))
        .and(path("/complete_batch"))
        .and(body_json(json!({"batch_index": 4})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok", "message": "Batch #4 removed. Remaining batches: 1", "batches_left": 1
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/complete_batch"))
        .and(body_json(json!({"batch_index": 7})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "already_removed", "message": "Batch #7 was already removed. Ignoring."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let processor = processor(FakeEmbedder::default());
    let summary = run_random(&client(&server), &processor, &no_wait()).await.unwrap();

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.stopped, StopReason::EndOfWork);
    assert_eq!(processor.store().points.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_random_retries_after_coordinator_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/get_random_batch"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"status": "error", "message": "pool file missing"})),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get_random_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok", "batch_index": 0, "batches_left": 1, "lines": lines(&["a"]),
        })))
        .up_to_n_times(1)
        .with_priority(2)
        .mount(&server)
        .await;
    mount_eof(&server, "/get_random_batch").await;

    Mock::given(method("POST"))
        .and(path("/complete_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok", "message": "Batch #0 removed. Remaining batches: 0", "batches_left": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = run_random(&client(&server), &processor(FakeEmbedder::default()), &no_wait())
        .await
        .unwrap();
    assert_eq!(summary.batches, 1);
}

#[tokio::test]
async fn test_random_failed_batch_is_not_completed() {
    let server = MockServer::start().await;

    // The same batch comes back after the first attempt fails
    Mock::given(method("GET"))
        .and(path("/get_random_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok", "batch_index": 3, "batches_left": 1, "lines": lines(&["a"]),
        })))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_eof(&server, "/get_random_batch").await;

    Mock::given(method("POST"))
        .and(path("/complete_batch"))
        .and(body_json(json!({"batch_index": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok", "message": "Batch #3 removed. Remaining batches: 0", "batches_left": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = FakeEmbedder {
        failures: 1,
        ..Default::default()
    };
    let summary = run_random(&client(&server), &processor(embedder), &no_wait())
        .await
        .unwrap();
    assert_eq!(summary.batches, 1);
}

#[tokio::test]
async fn test_random_stops_at_batch_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/get_random_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok", "batch_index": 1, "batches_left": 9, "lines": lines(&["a"]),
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/complete_batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok", "message": "Batch #1 removed. Remaining batches: 8", "batches_left": 8
        })))
        .expect(2)
        .mount(&server)
        .await;

    let config = RunnerConfig {
        max_batches: Some(2),
        ..no_wait()
    };
    let summary = run_random(&client(&server), &processor(FakeEmbedder::default()), &config)
        .await
        .unwrap();

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.stopped, StopReason::BatchLimit);
}

#[tokio::test]
async fn test_sequential_resumes_after_recorded_progress() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/get_progress"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok", "last_completed_batch": 1})),
        )
        .expect(1)
        .mount(&server)
        .await;
    for (batch, ids) in [(2, vec!["a", "b"]), (3, vec!["c"])] {
        Mock::given(method("GET"))
            .and(path("/get_batch"))
            .and(query_param("batch", batch.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok", "lines": lines(&ids), "next_batch_index": batch + 1,
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/update_progress"))
            .and(body_json(json!({"last_completed_batch": batch})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok", "message": format!("Progress updated to batch {}", batch)
            })))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/get_batch"))
        .and(query_param("batch", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "eof", "message": "End of dataset reached or batch index too high."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let processor = processor(FakeEmbedder::default());
    let summary = run_sequential(&client(&server), &processor, &no_wait(), None)
        .await
        .unwrap();

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.records, 3);
    assert_eq!(summary.stopped, StopReason::EndOfWork);
}

#[tokio::test]
async fn test_sequential_starts_at_zero_without_progress() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/get_progress"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/get_batch"))
        .and(query_param("batch", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "eof"})))
        .expect(1)
        .mount(&server)
        .await;

    let summary = run_sequential(
        &client(&server),
        &processor(FakeEmbedder::default()),
        &no_wait(),
        None,
    )
    .await
    .unwrap();
    assert_eq!(summary.batches, 0);
}

#[tokio::test]
async fn test_sequential_stops_when_progress_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/get_batch"))
        .and(query_param("batch", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok", "lines": lines(&["a"]), "next_batch_index": 6,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/update_progress"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"status": "error", "message": "disk full"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = run_sequential(
        &client(&server),
        &processor(FakeEmbedder::default()),
        &no_wait(),
        Some(5),
    )
    .await;

    match result {
        Err(WorkerError::Coordinator(message)) => assert_eq!(message, "disk full"),
        other => panic!("expected coordinator error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sequential_stops_on_processing_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/get_batch"))
        .and(query_param("batch", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok", "lines": lines(&["a"]), "next_batch_index": 1,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/update_progress"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let embedder = FakeEmbedder {
        failures: 1,
        ..Default::default()
    };
    let result = run_sequential(&client(&server), &processor(embedder), &no_wait(), Some(0)).await;
    assert!(matches!(result, Err(WorkerError::Embedding(_))));
}
