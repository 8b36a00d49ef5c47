use std::time::Duration;

use storage::Repository;

const CLAIM_LEASE: Duration = Duration::from_secs(300);

/// One tick of the FTS service (§4.6): claim chunks with no `fts_vector` yet and write
/// `to_tsvector(lang, text)` for each, using the article's detected language where
/// known and the configured default otherwise. No external dependencies.
///
/// Returns `(claimed, succeeded, failed)` for the caller's `MetricsCollector` (SPEC_FULL §2).
pub async fn tick(
    repo: &Repository,
    default_language: &str,
    batch_size: i64,
    worker_tag: &str,
) -> anyhow::Result<(u64, u64, u64)> {
    let chunks = repo
        .claim_chunks_needing_fts(batch_size, default_language, CLAIM_LEASE, worker_tag)
        .await?;
    let claimed = chunks.len() as u64;
    for (chunk_id, _text, language) in &chunks {
        repo.write_chunk_fts_vector(*chunk_id, language).await?;
    }
    Ok((claimed, claimed, 0))
}
