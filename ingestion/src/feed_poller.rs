use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use newsloom_core::config::PollerConfig;
use newsloom_core::diagnostics::{Component, Diagnostic, DiagnosticLevel};
use newsloom_core::domain::Feed;
use newsloom_core::error::{Classify, ErrorClass};
use newsloom_core::hashing::{canonicalize_url, url_hash};
use storage::Repository;
use thiserror::Error;

const MAX_FEED_BYTES: usize = 10 * 1024 * 1024;
const FEED_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CLAIM_LEASE: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("request timed out")]
    Timeout,
    #[error("feed parse error: {0}")]
    Parse(String),
    #[error("response exceeded size limit")]
    ResponseTooLarge,
    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),
}

impl Classify for FetchError {
    fn class(&self) -> ErrorClass {
        match self {
            FetchError::Network(_) | FetchError::Timeout => ErrorClass::TransientIo,
            FetchError::HttpStatus(_) | FetchError::Parse(_) | FetchError::ResponseTooLarge => {
                ErrorClass::PermanentIo
            }
            FetchError::Storage(err) => err.class(),
        }
    }
}

pub struct PollOutcome {
    pub feeds_polled: usize,
    pub entries_enqueued: usize,
}

/// Claims due feeds and polls each with bounded concurrency (`config.workers` at a
/// time), per §4.1. Each feed's outcome is recorded independently so one bad feed
/// never blocks the rest of the batch.
pub async fn poll(
    repo: &Repository,
    client: &reqwest::Client,
    config: &PollerConfig,
    batch_size: i64,
    worker_tag: &str,
) -> Result<PollOutcome, storage::StorageError> {
    let feeds = repo
        .claim_feeds_to_poll(batch_size, CLAIM_LEASE, worker_tag)
        .await?;
    if feeds.is_empty() {
        return Ok(PollOutcome {
            feeds_polled: 0,
            entries_enqueued: 0,
        });
    }

    let entries_enqueued = Arc::new(AtomicUsize::new(0));
    let feeds_polled = feeds.len();

    stream::iter(feeds.into_iter())
        .map(|feed| {
            let client = client.clone();
            let entries_enqueued = entries_enqueued.clone();
            async move {
                match poll_one(repo, &client, &feed).await {
                    Ok(inserted) => {
                        entries_enqueued.fetch_add(inserted, Ordering::Relaxed);
                    }
                    Err(err) => {
                        tracing::warn!(feed_id = feed.feed_id, error = %err, "feed poll failed");
                        let diagnostic = Diagnostic::new(
                            DiagnosticLevel::Warn,
                            Component::FeedPoller,
                            format!("feed poll failed: {err}"),
                        )
                        .with_error_class(err.class())
                        .with_detail("feed_id", feed.feed_id.to_string());
                        if let Err(diag_err) = repo.record_diagnostic(&diagnostic).await {
                            tracing::warn!(feed_id = feed.feed_id, error = %diag_err, "failed to record diagnostic");
                        }
                        if let Err(db_err) = repo
                            .record_feed_failure(
                                feed.feed_id,
                                config.max_consecutive_failures,
                                Duration::from_secs(config.backoff_base_seconds),
                                Duration::from_secs(config.backoff_cap_seconds),
                            )
                            .await
                        {
                            tracing::warn!(feed_id = feed.feed_id, error = %db_err, "failed to record feed failure");
                        }
                    }
                }
            }
        })
        .buffer_unordered(config.workers)
        .collect::<Vec<()>>()
        .await;

    Ok(PollOutcome {
        feeds_polled,
        entries_enqueued: entries_enqueued.load(Ordering::Relaxed),
    })
}

async fn poll_one(
    repo: &Repository,
    client: &reqwest::Client,
    feed: &Feed,
) -> Result<usize, FetchError> {
    let mut request = client.get(&feed.url);
    if let Some(etag) = &feed.last_etag {
        request = request.header(reqwest::header::IF_NONE_MATCH, etag);
    }
    if let Some(last_modified) = &feed.last_modified {
        request = request.header(reqwest::header::IF_MODIFIED_SINCE, last_modified);
    }

    let response = tokio::time::timeout(FEED_REQUEST_TIMEOUT, request.send())
        .await
        .map_err(|_| FetchError::Timeout)??;

    let now = chrono::Utc::now();

    if response.status() == reqwest::StatusCode::NOT_MODIFIED {
        repo.mark_feed_not_modified(feed.feed_id, now).await?;
        return Ok(0);
    }

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let etag = response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let last_modified = response
        .headers()
        .get(reqwest::header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let bytes = read_limited_bytes(response, MAX_FEED_BYTES).await?;
    let channel = rss::Channel::read_from(&bytes[..]).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut inserted = 0usize;
    for item in channel.items() {
        let Some(entry_url) = item.link() else {
            continue;
        };
        let Ok(canonical) = canonicalize_url(entry_url) else {
            continue;
        };
        let Ok(hash) = url_hash(entry_url) else {
            continue;
        };

        let source_domain = url::Url::parse(&canonical)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_default();
        let published_at = item
            .pub_date()
            .and_then(|raw| newsloom_core::time::parse_timestamp(raw).ok());

        let result = repo
            .insert_raw_article(
                feed.feed_id,
                &canonical,
                &hash,
                item.guid().map(|g| g.value()),
                &source_domain,
                item.title(),
                item.description(),
                published_at,
            )
            .await?;
        if result.is_some() {
            inserted += 1;
        }
    }

    repo.mark_feed_polled(feed.feed_id, now, etag.as_deref(), last_modified.as_deref())
        .await?;
    Ok(inserted)
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
