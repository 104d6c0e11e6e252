use super::*;
use crate::config::OllamaConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(host: &str, port: u16) -> OllamaConfig {
    OllamaConfig {
        protocol: "http".to_string(),
        host: host.to_string(),
        port,
        model: "test-model".to_string(),
        batch_size: 2,
        embedding_dimension: 4,
    }
}

fn mock_server_config(server: &MockServer) -> OllamaConfig {
    let uri = Url::parse(&server.uri()).expect("mock server uri parses");
    test_config(
        uri.host_str().expect("mock server has host"),
        uri.port().expect("mock server has port"),
    )
}

#[test]
fn client_configuration() {
    let config = test_config("test-host", 1234);
    let embedder = OllamaEmbedder::new(&config).expect("Failed to create embedder");

    assert_eq!(embedder.model, "test-model");
    assert_eq!(embedder.batch_size, 2);
    assert_eq!(embedder.base_url.host_str(), Some("test-host"));
    assert_eq!(embedder.base_url.port(), Some(1234));
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_returns_backend_vector() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embedding": [0.25, -0.5, 0.75, 1.0]
        })))
        .mount(&server)
        .await;

    let embedder =
        OllamaEmbedder::new(&mock_server_config(&server)).expect("Failed to create embedder");

    let vector = tokio::task::spawn_blocking(move || embedder.embed("hello world"))
        .await
        .expect("task completes")
        .expect("embedding succeeds");

    assert_eq!(vector, vec![0.25, -0.5, 0.75, 1.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_batch_splits_requests_by_batch_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[1.0, 0.0], [0.0, 1.0]]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let embedder =
        OllamaEmbedder::new(&mock_server_config(&server)).expect("Failed to create embedder");

    let texts: Vec<String> = (0..4).map(|i| format!("text {i}")).collect();
    let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
        .await
        .expect("task completes")
        .expect("batch embedding succeeds");

    assert_eq!(vectors.len(), 4);
    assert_eq!(vectors[0], vec![1.0, 0.0]);
    assert_eq!(vectors[3], vec![0.0, 1.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn embed_batch_of_nothing_is_empty() {
    let server = MockServer::start().await;
    let embedder =
        OllamaEmbedder::new(&mock_server_config(&server)).expect("Failed to create embedder");

    let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&[]))
        .await
        .expect("task completes")
        .expect("empty batch succeeds");

    assert!(vectors.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn backend_failure_propagates_as_embedding_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let embedder =
        OllamaEmbedder::new(&mock_server_config(&server)).expect("Failed to create embedder");

    let result = tokio::task::spawn_blocking(move || embedder.embed("hello"))
        .await
        .expect("task completes");

    assert!(matches!(result, Err(crate::KbError::Embedding(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn validate_model_rejects_missing_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "some-other-model", "size": 1024, "digest": "abc"}]
        })))
        .mount(&server)
        .await;

    let embedder =
        OllamaEmbedder::new(&mock_server_config(&server)).expect("Failed to create embedder");

    let result = tokio::task::spawn_blocking(move || embedder.validate_model())
        .await
        .expect("task completes");

    assert!(matches!(result, Err(crate::KbError::Embedding(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_passes_with_available_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "models": [{"name": "test-model", "size": 1024, "digest": "abc"}]
        })))
        .mount(&server)
        .await;

    let embedder =
        OllamaEmbedder::new(&mock_server_config(&server)).expect("Failed to create embedder");

    let result = tokio::task::spawn_blocking(move || embedder.health_check())
        .await
        .expect("task completes");

    assert!(result.is_ok());
}
