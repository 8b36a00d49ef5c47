use std::sync::Arc;
use std::time::Duration;

use ingestion::llm_chunker::LlmChunker;
use newsloom_core::diagnostics::{Component, Diagnostic, DiagnosticLevel};
use newsloom_core::error::{Classify, ErrorClass};
use storage::Repository;
use tracing::warn;

const CLAIM_LEASE: Duration = Duration::from_secs(300);

async fn record(repo: &Repository, diagnostic: Diagnostic) {
    if let Err(err) = repo.record_diagnostic(&diagnostic).await {
        warn!(error = %err, "failed to record diagnostic");
    }
}

/// One tick of the chunking service (§4.4): claim articles with no chunks yet, chunk
/// each, and replace its chunk set in one transaction. A per-article failure is logged,
/// recorded as a `diagnostics` row (§7), and the article's `chunking_status` advances to
/// `error`; the batch continues. A response that fails every shape in §4.3 and falls
/// back to paragraph splitting is not a failure but still produces a `parse_error`
/// diagnostic, per the end-to-end scenario requiring one such row.
///
/// Returns `(claimed, succeeded, failed)` for the caller's `MetricsCollector` (SPEC_FULL §2).
pub async fn tick(
    repo: &Repository,
    chunker: Arc<LlmChunker>,
    batch_size: i64,
    worker_tag: &str,
) -> anyhow::Result<(u64, u64, u64)> {
    let articles = repo
        .claim_articles_needing_chunks(batch_size, CLAIM_LEASE, worker_tag)
        .await?;
    let claimed = articles.len() as u64;
    let mut succeeded = 0u64;
    let mut failed = 0u64;

    for article in articles {
        match chunker.chunk(&article.clean_text).await {
            Ok(outcome) => {
                if outcome.used_fallback {
                    record(
                        repo,
                        Diagnostic::new(
                            DiagnosticLevel::Warn,
                            Component::ChunkingService,
                            "llm response unparseable, used paragraph fallback",
                        )
                        .with_error_class(ErrorClass::ParseError)
                        .with_detail("article_id", article.article_id.to_string()),
                    )
                    .await;
                }

                if let Err(err) = repo.replace_chunks(article.article_id, &outcome.chunks).await {
                    warn!(article_id = article.article_id, error = %err, "failed to persist chunks");
                    record(
                        repo,
                        Diagnostic::new(
                            DiagnosticLevel::Error,
                            Component::ChunkingService,
                            format!("failed to persist chunks: {err}"),
                        )
                        .with_error_class(err.class())
                        .with_detail("article_id", article.article_id.to_string()),
                    )
                    .await;
                    repo.mark_article_chunking_error(article.article_id).await?;
                    failed += 1;
                } else {
                    succeeded += 1;
                }
            }
            Err(err) => {
                warn!(article_id = article.article_id, error = %err, "chunking failed");
                record(
                    repo,
                    Diagnostic::new(
                        DiagnosticLevel::Error,
                        Component::ChunkingService,
                        format!("chunking failed: {err}"),
                    )
                    .with_error_class(err.class())
                    .with_detail("article_id", article.article_id.to_string()),
                )
                .await;
                repo.mark_article_chunking_error(article.article_id).await?;
                failed += 1;
            }
        }
    }
    Ok((claimed, succeeded, failed))
}
