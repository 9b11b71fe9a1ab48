//! Idea search against mocked embedding and Qdrant services

use linebatch_worker::pipeline::{HttpEmbedder, QdrantStore};
use linebatch_worker::search::{find_similar, render};
use linebatch_worker::WorkerError;
use reqwest::Client;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn collaborators(server: &MockServer) -> (HttpEmbedder, QdrantStore) {
    let http = Client::new();
    let embedder = HttpEmbedder::new(http.clone(), format!("{}/embed", server.uri()), "passage: ", 32);
    (embedder, QdrantStore::new(http, server.uri(), "idea-db"))
}

#[tokio::test]
async fn test_search_embeds_query_and_lists_matches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_json(json!({"inputs": ["query: cheap sodium cathodes"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.5, 0.25]])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/idea-db/points/search"))
        .and(body_json(json!({"vector": [0.5, 0.25], "limit": 2, "with_payload": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"id": 11, "version": 0, "score": 0.75, "payload": {
                    "type": "arXiv",
                    "original_json": {"title": "Sodium-ion cathodes", "abstract": "Layered oxides."}
                }},
                {"id": 12, "version": 0, "score": 0.5, "payload": {
                    "type": "arXiv",
                    "original_json": {"title": "Lithium recycling", "abstract": "Hydrometallurgy."}
                }}
            ],
            "status": "ok",
            "time": 0.002
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (embedder, store) = collaborators(&server);
    let matches = find_similar(&embedder, &store, "  cheap sodium cathodes ", 2)
        .await
        .unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].title, "Sodium-ion cathodes");
    assert_eq!(matches[0].score, 0.75);
    assert_eq!(matches[1].abstract_preview, "Hydrometallurgy.");

    let listing = render(&matches);
    assert!(listing.contains("#1  score 0.7500  [arXiv]"));
    assert!(listing.contains("#2  score 0.5000  [arXiv]"));
}

#[tokio::test]
async fn test_search_with_no_hits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[0.5, 0.25]])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/idea-db/points/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": [], "status": "ok"})))
        .mount(&server)
        .await;

    let (embedder, store) = collaborators(&server);
    let matches = find_similar(&embedder, &store, "anything", 3).await.unwrap();
    assert!(matches.is_empty());
    assert!(render(&matches).starts_with("No results found"));
}

#[tokio::test]
async fn test_blank_search_text_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (embedder, store) = collaborators(&server);
    let result = find_similar(&embedder, &store, "   ", 3).await;
    assert!(matches!(result, Err(WorkerError::Config(_))));
}
