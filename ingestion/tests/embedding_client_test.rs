use ingestion::embedding_client::EmbeddingClient;
use newsloom_core::config::EmbeddingConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> EmbeddingConfig {
    EmbeddingConfig {
        model: "test-embed".to_string(),
        dim: 3,
        batch_size: 64,
    }
}

#[tokio::test]
async fn embed_batch_returns_vectors_in_request_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
        })))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(ingestion::http::build_client(), server.uri(), test_config());
    let result = client
        .embed_batch(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();

    assert_eq!(result, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
}

#[tokio::test]
async fn embed_batch_errors_on_response_count_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[1.0, 2.0, 3.0]],
        })))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(ingestion::http::build_client(), server.uri(), test_config());
    let result = client
        .embed_batch(&["first".to_string(), "second".to_string()])
        .await;

    assert!(result.is_err());
}
