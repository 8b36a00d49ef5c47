// Requires a reachable Postgres; set TEST_DATABASE_URL to run. Gated with `#[ignore]`
// per this exercise's convention for tests that observe real database behavior
// (claim/lease races, duplicate-URL dedup across a poll pass).
use newsloom_core::config::PollerConfig;
use sqlx::postgres::PgPoolOptions;
use storage::Repository;

fn poller_config() -> PollerConfig {
    PollerConfig {
        max_consecutive_failures: 10,
        backoff_base_seconds: 300,
        backoff_cap_seconds: 21600,
        workers: 4,
    }
}

async fn test_repo() -> Repository {
    let dsn = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&dsn)
        .await
        .expect("failed to connect to test database");
    storage::schema::ensure_schema(&pool, 8)
        .await
        .expect("failed to ensure schema");
    Repository::new(pool)
}

#[ignore]
#[tokio::test]
async fn claiming_a_due_feed_marks_it_claimed_and_excludes_it_from_a_concurrent_claim() {
    let repo = test_repo().await;
    let feed_id = repo
        .insert_feed("https://news.example.com/feed.xml")
        .await
        .unwrap();

    let first = repo
        .claim_feeds_to_poll(10, std::time::Duration::from_secs(300), "worker-a")
        .await
        .unwrap();
    assert!(first.iter().any(|f| f.feed_id == feed_id));

    let second = repo
        .claim_feeds_to_poll(10, std::time::Duration::from_secs(300), "worker-b")
        .await
        .unwrap();
    assert!(second.iter().all(|f| f.feed_id != feed_id));
}

#[ignore]
#[tokio::test]
async fn repeated_poll_failures_disable_the_feed_past_the_threshold() {
    let repo = test_repo().await;
    let feed_id = repo
        .insert_feed("https://flaky.example.com/feed.xml")
        .await
        .unwrap();
    let config = poller_config();

    for _ in 0..config.max_consecutive_failures {
        repo.record_feed_failure(
            feed_id,
            config.max_consecutive_failures,
            std::time::Duration::from_secs(config.backoff_base_seconds),
            std::time::Duration::from_secs(config.backoff_cap_seconds),
        )
        .await
        .unwrap();
    }

    let claimable = repo
        .claim_feeds_to_poll(10, std::time::Duration::from_secs(300), "worker-a")
        .await
        .unwrap();
    assert!(claimable.iter().all(|f| f.feed_id != feed_id));
}
