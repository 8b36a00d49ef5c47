use std::time::Duration;

use newsloom_core::config::WorkerConfig;
use newsloom_core::diagnostics::{Component, Diagnostic, DiagnosticLevel};
use newsloom_core::domain::RawArticle;
use newsloom_core::error::{Classify, ErrorClass};
use newsloom_core::hashing::{normalize_text, text_hash};
use storage::Repository;
use thiserror::Error;

use crate::extract::{detect_content_kind, extract_main_text, extract_utf8, ContentKind};
use crate::url_policy::UrlPolicy;

const CLAIM_LEASE: Duration = Duration::from_secs(300);
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;
const RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("invalid utf-8 body")]
    InvalidUtf8,
    #[error("extracted text too short")]
    TooShort,
    #[error("url rejected by policy")]
    PolicyRejected,
}

impl Classify for WorkError {
    fn class(&self) -> ErrorClass {
        match self {
            WorkError::Network(_) => ErrorClass::TransientIo,
            WorkError::HttpStatus(_)
            | WorkError::UnsupportedType(_)
            | WorkError::InvalidUtf8
            | WorkError::TooShort
            | WorkError::PolicyRejected => ErrorClass::PermanentIo,
        }
    }
}

async fn record(repo: &Repository, diagnostic: Diagnostic) {
    if let Err(err) = repo.record_diagnostic(&diagnostic).await {
        tracing::warn!(error = %err, "failed to record diagnostic");
    }
}

#[derive(Debug, Default)]
pub struct WorkCounts {
    pub stored: usize,
    pub duplicate: usize,
    pub error: usize,
    pub retried: usize,
}

/// Claims up to `batch_size` `raw` rows and processes each independently (§4.2):
/// fetch, extract, dedup by `text_hash`, and either insert a new canonical article or
/// mark the row as a duplicate of an existing one.
pub async fn work(
    repo: &Repository,
    client: &reqwest::Client,
    policy: &dyn UrlPolicy,
    config: &WorkerConfig,
    batch_size: i64,
    worker_tag: &str,
) -> Result<WorkCounts, storage::StorageError> {
    let claimed = repo
        .claim_raw_articles(batch_size, CLAIM_LEASE, worker_tag)
        .await?;

    let mut counts = WorkCounts::default();
    for raw in claimed {
        match process_one(repo, client, policy, config, &raw).await {
            Ok(Outcome::Stored) => counts.stored += 1,
            Ok(Outcome::Duplicate) => counts.duplicate += 1,
            Ok(Outcome::Retried) => counts.retried += 1,
            Ok(Outcome::Errored) => counts.error += 1,
            Err(err) => return Err(err),
        }
    }
    Ok(counts)
}

enum Outcome {
    Stored,
    Duplicate,
    Retried,
    Errored,
}

async fn process_one(
    repo: &Repository,
    client: &reqwest::Client,
    policy: &dyn UrlPolicy,
    config: &WorkerConfig,
    raw: &RawArticle,
) -> Result<Outcome, storage::StorageError> {
    if !policy.allows(&raw.url) {
        record(
            repo,
            Diagnostic::new(
                DiagnosticLevel::Warn,
                Component::ArticleWorker,
                "url rejected by policy",
            )
            .with_error_class(WorkError::PolicyRejected.class())
            .with_detail("raw_article_id", raw.raw_article_id.to_string()),
        )
        .await;
        repo.record_raw_failure(
            raw.raw_article_id,
            "policy_rejected",
            config.max_attempts,
            RETRY_DELAY,
        )
        .await?;
        return Ok(Outcome::Errored);
    }

    match fetch_and_extract(client, &raw.url, config).await {
        Ok(clean_text) => {
            let hash = text_hash(&clean_text);
            if let Some(canonical_id) = repo.find_canonical_article_by_text_hash(&hash).await? {
                repo.mark_raw_duplicate(raw.raw_article_id, canonical_id)
                    .await?;
                return Ok(Outcome::Duplicate);
            }

            let title_norm = normalize_text(&raw.title.clone().unwrap_or_default());
            repo.insert_article_index(
                &raw.url,
                &raw.url,
                &raw.source_domain,
                &raw.source_domain,
                &title_norm,
                &clean_text,
                &hash,
                raw.published_at,
                "english",
            )
            .await?;
            repo.mark_raw_stored(raw.raw_article_id).await?;
            Ok(Outcome::Stored)
        }
        Err(err) => {
            record(
                repo,
                Diagnostic::new(
                    DiagnosticLevel::Warn,
                    Component::ArticleWorker,
                    format!("fetch/extract failed: {err}"),
                )
                .with_error_class(err.class())
                .with_detail("raw_article_id", raw.raw_article_id.to_string()),
            )
            .await;
            repo.record_raw_failure(
                raw.raw_article_id,
                &err.to_string(),
                config.max_attempts,
                RETRY_DELAY,
            )
            .await?;
            if (raw.attempt_count as u32 + 1) < config.max_attempts {
                Ok(Outcome::Retried)
            } else {
                Ok(Outcome::Errored)
            }
        }
    }
}

async fn fetch_and_extract(
    client: &reqwest::Client,
    url: &str,
    config: &WorkerConfig,
) -> Result<String, WorkError> {
    let response = tokio::time::timeout(Duration::from_secs(20), client.get(url).send())
        .await
        .map_err(|_| WorkError::HttpStatus(408))??;

    if !response.status().is_success() {
        return Err(WorkError::HttpStatus(response.status().as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("text/html")
        .to_string();

    if let Some(len) = response.content_length() {
        if len as usize > MAX_BODY_BYTES {
            return Err(WorkError::HttpStatus(413));
        }
    }

    let bytes = response.bytes().await?;
    if bytes.len() > MAX_BODY_BYTES {
        return Err(WorkError::HttpStatus(413));
    }

    let clean_text = match detect_content_kind(&content_type) {
        ContentKind::Html => extract_main_text(&extract_utf8(&bytes).map_err(|_| WorkError::InvalidUtf8)?),
        ContentKind::Text => extract_utf8(&bytes).map_err(|_| WorkError::InvalidUtf8)?,
        ContentKind::Unsupported => return Err(WorkError::UnsupportedType(content_type)),
    };

    if clean_text.chars().count() < config.min_clean_text_chars {
        return Err(WorkError::TooShort);
    }

    Ok(clean_text)
}
