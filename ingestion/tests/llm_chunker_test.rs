use ingestion::llm_chunker::LlmChunker;
use newsloom_core::config::LlmConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn chunk_parses_named_array_response_from_llm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"chunks": [{"text": "First chunk.", "topic": "intro", "type": "intro"}, {"text": "Second chunk.", "type": "body"}]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let config = LlmConfig {
        base_url: server.uri(),
        model: "test-model".to_string(),
        max_chunk_chars: 4000,
    };
    let chunker = LlmChunker::new(ingestion::http::build_client(), config);
    let outcome = chunker.chunk("First chunk.\n\nSecond chunk.").await.unwrap();

    assert!(!outcome.used_fallback);
    assert_eq!(outcome.chunks.len(), 2);
    assert_eq!(outcome.chunks[0].text, "First chunk.");
    assert_eq!(outcome.chunks[0].chunk_index, 0);
    assert_eq!(outcome.chunks[1].chunk_index, 1);
}

#[tokio::test]
async fn chunk_falls_back_to_paragraphs_when_response_is_unparseable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("not json at all", "text/plain"))
        .mount(&server)
        .await;

    let config = LlmConfig {
        base_url: server.uri(),
        model: "test-model".to_string(),
        max_chunk_chars: 4000,
    };
    let chunker = LlmChunker::new(ingestion::http::build_client(), config);
    let outcome = chunker
        .chunk("Paragraph one.\n\nParagraph two.")
        .await
        .unwrap();

    assert!(outcome.used_fallback);
    assert_eq!(outcome.chunks.len(), 2);
    assert!(outcome.chunks.iter().all(|c| c.topic.is_none()));
}
