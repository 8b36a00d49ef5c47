use std::time::Duration;

/// A single shared client with a 5s connect timeout (SPEC_FULL §5); each caller applies
/// its own read timeout on top via `tokio::time::timeout`, since reqwest's own
/// per-request timeout can't be tuned per call on a shared `Client`.
pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .user_agent("newsloom/0.1")
        .build()
        .expect("reqwest client configuration is static and always valid")
}
