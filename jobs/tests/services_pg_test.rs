// Requires a reachable Postgres; set TEST_DATABASE_URL to run. Gated with `#[ignore]`
// per this exercise's convention for tests observing real database behavior.
use ingestion::embedding_client::EmbeddingClient;
use newsloom_core::config::EmbeddingConfig;
use sqlx::postgres::PgPoolOptions;
use storage::Repository;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn test_repo() -> Repository {
    let dsn = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&dsn)
        .await
        .expect("failed to connect to test database");
    storage::schema::ensure_schema(&pool, 4)
        .await
        .expect("failed to ensure schema");
    Repository::new(pool)
}

#[ignore]
#[tokio::test]
async fn fts_service_tick_indexes_a_pending_chunk() {
    let repo = test_repo().await;

    let article_id = repo
        .insert_article_index(
            "https://news.example.com/a",
            "https://news.example.com/a",
            "example",
            "news.example.com",
            "a headline",
            "Some clean article body text that is long enough to pass the minimum.",
            "fts-test-hash",
            None,
            "english",
        )
        .await
        .unwrap();

    let chunks = vec![storage::NewChunk {
        chunk_index: 0,
        text: "Some clean article body text.".to_string(),
        topic: None,
        chunk_type: newsloom_core::domain::ChunkType::Body,
        token_estimate: 10,
    }];
    repo.replace_chunks(article_id, &chunks).await.unwrap();

    jobs::fts_service::tick(&repo, "english", 10, "test-worker")
        .await
        .unwrap();

    let remaining = repo
        .claim_chunks_needing_fts(10, "english", std::time::Duration::from_secs(300), "test-worker")
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[ignore]
#[tokio::test]
async fn embedding_service_tick_writes_vectors_for_claimed_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [[0.1, 0.2, 0.3, 0.4]],
        })))
        .mount(&server)
        .await;

    let repo = test_repo().await;
    let article_id = repo
        .insert_article_index(
            "https://news.example.com/b",
            "https://news.example.com/b",
            "example",
            "news.example.com",
            "b headline",
            "Another clean article body with enough characters to be valid.",
            "embed-test-hash",
            None,
            "english",
        )
        .await
        .unwrap();
    let chunks = vec![storage::NewChunk {
        chunk_index: 0,
        text: "Another clean article body.".to_string(),
        topic: None,
        chunk_type: newsloom_core::domain::ChunkType::Body,
        token_estimate: 8,
    }];
    repo.replace_chunks(article_id, &chunks).await.unwrap();

    let config = EmbeddingConfig {
        model: "test-embed".to_string(),
        dim: 4,
        batch_size: 64,
    };
    let client = EmbeddingClient::new(ingestion::http::build_client(), server.uri(), config.clone());

    jobs::embedding_service::tick(&repo, &client, &config, 10, 3, "test-worker")
        .await
        .unwrap();

    let remaining = repo
        .claim_chunks_needing_embedding(10, std::time::Duration::from_secs(300), "test-worker")
        .await
        .unwrap();
    assert!(remaining.is_empty());
}
