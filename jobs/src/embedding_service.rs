use std::time::Duration;

use ingestion::embedding_client::EmbeddingClient;
use newsloom_core::config::EmbeddingConfig;
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

/// One tick of the embedding service (§4.5): claim chunks with `embedding IS NULL`,
/// group into sub-batches of `config.batch_size`, call the embedding client, and write
/// vectors back. A vector of the wrong dimension is refused and recorded as a
/// `dimension_mismatch` diagnostic (§7); the owning chunk's attempt count is bumped
/// instead of the vector being written. A sub-batch request failure is recorded once
/// per affected chunk.
///
/// Returns `(claimed, succeeded, failed)` for the caller's `MetricsCollector` (SPEC_FULL §2).
pub async fn tick(
    repo: &Repository,
    client: &EmbeddingClient,
    config: &EmbeddingConfig,
    batch_size: i64,
    max_attempts: u32,
    worker_tag: &str,
) -> anyhow::Result<(u64, u64, u64)> {
    let chunks = repo
        .claim_chunks_needing_embedding(batch_size, CLAIM_LEASE, worker_tag)
        .await?;
    let claimed = chunks.len() as u64;
    if chunks.is_empty() {
        return Ok((0, 0, 0));
    }

    let mut succeeded = 0u64;
    let mut failed = 0u64;

    for sub_batch in chunks.chunks(config.batch_size) {
        let texts: Vec<String> = sub_batch.iter().map(|c| c.text.clone()).collect();
        match client.embed_batch(&texts).await {
            Ok(vectors) => {
                for (chunk, vector) in sub_batch.iter().zip(vectors) {
                    match repo
                        .write_chunk_embedding(chunk.chunk_id, vector, config.dim)
                        .await
                    {
                        Ok(()) => succeeded += 1,
                        Err(storage::StorageError::DimensionMismatch { expected, actual }) => {
                            warn!(
                                chunk_id = chunk.chunk_id,
                                expected, actual, "embedding dimension mismatch"
                            );
                            record(
                                repo,
                                Diagnostic::new(
                                    DiagnosticLevel::Error,
                                    Component::EmbeddingService,
                                    format!("embedding has {actual} dimensions, expected {expected}"),
                                )
                                .with_error_class(ErrorClass::DimensionMismatch)
                                .with_detail("chunk_id", chunk.chunk_id.to_string()),
                            )
                            .await;
                            repo.record_embedding_failure(chunk.chunk_id, max_attempts)
                                .await?;
                            failed += 1;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "embedding request failed for sub-batch");
                for chunk in sub_batch {
                    record(
                        repo,
                        Diagnostic::new(
                            DiagnosticLevel::Error,
                            Component::EmbeddingService,
                            format!("embedding request failed: {err}"),
                        )
                        .with_error_class(err.class())
                        .with_detail("chunk_id", chunk.chunk_id.to_string()),
                    )
                    .await;
                    repo.record_embedding_failure(chunk.chunk_id, max_attempts)
                        .await?;
                    failed += 1;
                }
            }
        }
    }
    Ok((claimed, succeeded, failed))
}
