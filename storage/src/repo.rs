use chrono::{DateTime, Utc};
use newsloom_core::diagnostics::{Diagnostic, DiagnosticSink};
use newsloom_core::domain::{
    ArticleChunk, ArticleIndex, ChunkType, Feed, FeedStatus, RawArticle, RawArticleStatus,
};
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Duration;

use crate::error::StorageError;

/// Thin wrapper around a single shared `sqlx::PgPool` (SPEC_FULL §5, "Connection
/// management"). Every service is handed a clone of this rather than opening its own
/// connections.
#[derive(Clone)]
pub struct Repository {
    pool: PgPool,
}

fn feed_status_from_row(row: &PgRow, col: &str) -> Result<FeedStatus, StorageError> {
    match row.try_get::<String, _>(col)?.as_str() {
        "active" => Ok(FeedStatus::Active),
        "disabled" => Ok(FeedStatus::Disabled),
        "error" => Ok(FeedStatus::Error),
        other => Err(StorageError::Query(sqlx::Error::Decode(
            format!("unknown feed status '{other}'").into(),
        ))),
    }
}

fn raw_status_from_row(row: &PgRow, col: &str) -> Result<RawArticleStatus, StorageError> {
    match row.try_get::<String, _>(col)?.as_str() {
        "pending" => Ok(RawArticleStatus::Pending),
        "fetching" => Ok(RawArticleStatus::Fetching),
        "stored" => Ok(RawArticleStatus::Stored),
        "duplicate" => Ok(RawArticleStatus::Duplicate),
        "error" => Ok(RawArticleStatus::Error),
        other => Err(StorageError::Query(sqlx::Error::Decode(
            format!("unknown raw article status '{other}'").into(),
        ))),
    }
}

fn chunk_type_from_row(row: &PgRow, col: &str) -> Result<ChunkType, StorageError> {
    match row.try_get::<String, _>(col)?.as_str() {
        "intro" => Ok(ChunkType::Intro),
        "body" => Ok(ChunkType::Body),
        "conclusion" => Ok(ChunkType::Conclusion),
        _ => Ok(ChunkType::Other),
    }
}

fn feed_from_row(row: PgRow) -> Result<Feed, StorageError> {
    Ok(Feed {
        feed_id: row.try_get("feed_id")?,
        url: row.try_get("url")?,
        status: feed_status_from_row(&row, "status")?,
        last_fetched_at: row.try_get("last_fetched_at")?,
        last_etag: row.try_get("last_etag")?,
        last_modified: row.try_get("last_modified")?,
        consecutive_failure_count: row.try_get("consecutive_failure_count")?,
    })
}

fn raw_article_from_row(row: PgRow) -> Result<RawArticle, StorageError> {
    Ok(RawArticle {
        raw_article_id: row.try_get("raw_article_id")?,
        feed_id: row.try_get("feed_id")?,
        url: row.try_get("url")?,
        url_hash: row.try_get("url_hash")?,
        guid: row.try_get("guid")?,
        source_domain: row.try_get("source_domain")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        published_at: row.try_get("published_at")?,
        fetched_at: row.try_get("fetched_at")?,
        status: raw_status_from_row(&row, "status")?,
        attempt_count: row.try_get("attempt_count")?,
        last_error: row.try_get("last_error")?,
    })
}

fn article_index_from_row(row: PgRow) -> Result<ArticleIndex, StorageError> {
    Ok(ArticleIndex {
        article_id: row.try_get("article_id")?,
        url: row.try_get("url")?,
        canonical_url: row.try_get("canonical_url")?,
        source: row.try_get("source")?,
        domain: row.try_get("domain")?,
        title_norm: row.try_get("title_norm")?,
        clean_text: row.try_get("clean_text")?,
        text_hash: row.try_get("text_hash")?,
        published_at: row.try_get("published_at")?,
        is_canonical: row.try_get("is_canonical")?,
        canonical_article_id: row.try_get("canonical_article_id")?,
        language: row.try_get("language")?,
    })
}

fn article_chunk_from_row(row: PgRow) -> Result<ArticleChunk, StorageError> {
    let embedding: Option<Vector> = row.try_get("embedding")?;
    Ok(ArticleChunk {
        chunk_id: row.try_get("chunk_id")?,
        article_id: row.try_get("article_id")?,
        chunk_index: row.try_get("chunk_index")?,
        text: row.try_get("text")?,
        topic: row.try_get("topic")?,
        chunk_type: chunk_type_from_row(&row, "chunk_type")?,
        token_estimate: row.try_get("token_estimate")?,
        embedding: embedding.map(|v| v.to_vec()),
        has_fts_vector: {
            let raw: Option<String> = row.try_get("fts_vector")?;
            raw.is_some()
        },
    })
}

/// One row to write back as part of a chunk replace (SPEC_FULL §4.3, §4.4).
pub struct NewChunk {
    pub chunk_index: i32,
    pub text: String,
    pub topic: Option<String>,
    pub chunk_type: ChunkType,
    pub token_estimate: i32,
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---- feeds ---------------------------------------------------------

    pub async fn insert_feed(&self, url: &str) -> Result<i64, StorageError> {
        let row = sqlx::query("INSERT INTO feeds (url) VALUES ($1) RETURNING feed_id")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("feed_id")?)
    }

    /// Claims up to `batch_size` feeds due for polling, per the `FOR UPDATE SKIP LOCKED`
    /// claim protocol of §5. `worker` tags the claim so crashed-worker leases can be
    /// told apart from an active claim while debugging.
    pub async fn claim_feeds_to_poll(
        &self,
        batch_size: i64,
        lease: Duration,
        worker: &str,
    ) -> Result<Vec<Feed>, StorageError> {
        let lease_secs = lease.as_secs() as f64;
        let rows = sqlx::query(
            r#"
            UPDATE feeds SET claimed_at = now(), claimed_by = $1
            WHERE feed_id IN (
                SELECT feed_id FROM feeds
                WHERE status = 'active'
                  AND next_poll_at <= now()
                  AND (claimed_at IS NULL OR claimed_at < now() - ($2 || ' seconds')::interval)
                ORDER BY next_poll_at
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING feed_id, url, status, last_fetched_at, last_etag, last_modified,
                      consecutive_failure_count
            "#,
        )
        .bind(worker)
        .bind(lease_secs)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(feed_from_row).collect()
    }

    pub async fn mark_feed_not_modified(
        &self,
        feed_id: i64,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            UPDATE feeds SET last_fetched_at = $2, consecutive_failure_count = 0,
                   next_poll_at = now(), claimed_at = NULL, claimed_by = NULL
            WHERE feed_id = $1
            "#,
        )
        .bind(feed_id)
        .bind(fetched_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_feed_polled(
        &self,
        feed_id: i64,
        fetched_at: DateTime<Utc>,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            UPDATE feeds SET last_fetched_at = $2, last_etag = $3, last_modified = $4,
                   consecutive_failure_count = 0, next_poll_at = now(),
                   claimed_at = NULL, claimed_by = NULL
            WHERE feed_id = $1
            "#,
        )
        .bind(feed_id)
        .bind(fetched_at)
        .bind(etag)
        .bind(last_modified)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records a poll failure. Past `max_consecutive_failures` the feed is disabled by
    /// setting `status='error'`; otherwise `next_poll_at` backs off exponentially,
    /// capped, per the poller's back-off schedule (SPEC_FULL §4.1, §9).
    pub async fn record_feed_failure(
        &self,
        feed_id: i64,
        max_consecutive_failures: u32,
        backoff_base: Duration,
        backoff_cap: Duration,
    ) -> Result<(), StorageError> {
        let row = sqlx::query(
            "UPDATE feeds SET consecutive_failure_count = consecutive_failure_count + 1,
                    claimed_at = NULL, claimed_by = NULL
             WHERE feed_id = $1 RETURNING consecutive_failure_count",
        )
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await?;
        let failures: i32 = row.try_get("consecutive_failure_count")?;

        if failures as u32 >= max_consecutive_failures {
            sqlx::query("UPDATE feeds SET status = 'error' WHERE feed_id = $1")
                .bind(feed_id)
                .execute(&self.pool)
                .await?;
            return Ok(());
        }

        let backoff_secs =
            (backoff_base.as_secs() * 2u64.saturating_pow(failures.max(0) as u32))
                .min(backoff_cap.as_secs());
        sqlx::query(
            "UPDATE feeds SET next_poll_at = now() + ($2 || ' seconds')::interval
             WHERE feed_id = $1",
        )
        .bind(feed_id)
        .bind(backoff_secs as f64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- raw articles ---------------------------------------------------

    /// Inserts a newly-seen feed entry as `pending`. A unique-violation on `url_hash`
    /// means the entry was already seen and is treated as a no-op, per §4.1.
    pub async fn insert_raw_article(
        &self,
        feed_id: i64,
        url: &str,
        url_hash: &str,
        guid: Option<&str>,
        source_domain: &str,
        title: Option<&str>,
        summary: Option<&str>,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<Option<i64>, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO raw (feed_id, url, url_hash, guid, source_domain, title, summary, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (url_hash) DO NOTHING
            RETURNING raw_article_id
            "#,
        )
        .bind(feed_id)
        .bind(url)
        .bind(url_hash)
        .bind(guid)
        .bind(source_domain)
        .bind(title)
        .bind(summary)
        .bind(published_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match result {
            Some(row) => Some(row.try_get("raw_article_id")?),
            None => None,
        })
    }

    pub async fn claim_raw_articles(
        &self,
        batch_size: i64,
        lease: Duration,
        worker: &str,
    ) -> Result<Vec<RawArticle>, StorageError> {
        let lease_secs = lease.as_secs() as f64;
        let rows = sqlx::query(
            r#"
            UPDATE raw SET status = 'fetching', claimed_at = now(), claimed_by = $1
            WHERE raw_article_id IN (
                SELECT raw_article_id FROM raw
                WHERE status = 'pending'
                  AND next_attempt_at <= now()
                  AND (claimed_at IS NULL OR claimed_at < now() - ($2 || ' seconds')::interval)
                ORDER BY fetched_at
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING raw_article_id, feed_id, url, url_hash, guid, source_domain, title,
                      summary, published_at, fetched_at, status, attempt_count, last_error
            "#,
        )
        .bind(worker)
        .bind(lease_secs)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(raw_article_from_row).collect()
    }

    pub async fn mark_raw_stored(&self, raw_article_id: i64) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE raw SET status = 'stored', claimed_at = NULL, claimed_by = NULL
             WHERE raw_article_id = $1",
        )
        .bind(raw_article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_raw_duplicate(
        &self,
        raw_article_id: i64,
        canonical_article_id: i64,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE raw SET status = 'duplicate', canonical_article_id = $2,
                    claimed_at = NULL, claimed_by = NULL
             WHERE raw_article_id = $1",
        )
        .bind(raw_article_id)
        .bind(canonical_article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records a fetch/extract failure. Below `max_attempts` the row goes back to
    /// `pending` with a backed-off `next_attempt_at`; at or past it, the row becomes
    /// terminally `error` (§4.2).
    pub async fn record_raw_failure(
        &self,
        raw_article_id: i64,
        reason: &str,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Result<(), StorageError> {
        let row = sqlx::query(
            "UPDATE raw SET attempt_count = attempt_count + 1, last_error = $2,
                    claimed_at = NULL, claimed_by = NULL
             WHERE raw_article_id = $1 RETURNING attempt_count",
        )
        .bind(raw_article_id)
        .bind(reason)
        .fetch_one(&self.pool)
        .await?;
        let attempts: i32 = row.try_get("attempt_count")?;

        if attempts as u32 >= max_attempts {
            sqlx::query("UPDATE raw SET status = 'error' WHERE raw_article_id = $1")
                .bind(raw_article_id)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query(
                "UPDATE raw SET status = 'pending',
                        next_attempt_at = now() + ($2 || ' seconds')::interval
                 WHERE raw_article_id = $1",
            )
            .bind(raw_article_id)
            .bind(retry_delay.as_secs() as f64)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    // ---- articles_index --------------------------------------------------

    pub async fn find_canonical_article_by_text_hash(
        &self,
        text_hash: &str,
    ) -> Result<Option<i64>, StorageError> {
        let row = sqlx::query(
            "SELECT article_id FROM articles_index WHERE text_hash = $1 AND is_canonical",
        )
        .bind(text_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(match row {
            Some(row) => Some(row.try_get("article_id")?),
            None => None,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_article_index(
        &self,
        url: &str,
        canonical_url: &str,
        source: &str,
        domain: &str,
        title_norm: &str,
        clean_text: &str,
        text_hash: &str,
        published_at: Option<DateTime<Utc>>,
        language: &str,
    ) -> Result<i64, StorageError> {
        let row = sqlx::query(
            r#"
            INSERT INTO articles_index
                (url, canonical_url, source, domain, title_norm, clean_text, text_hash,
                 published_at, language)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING article_id
            "#,
        )
        .bind(url)
        .bind(canonical_url)
        .bind(source)
        .bind(domain)
        .bind(title_norm)
        .bind(clean_text)
        .bind(text_hash)
        .bind(published_at)
        .bind(language)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("article_id")?)
    }

    // ---- chunking service --------------------------------------------------

    /// Claims up to `batch_size` canonical articles with no chunks yet, per the same
    /// `UPDATE ... RETURNING` claim protocol as `claim_raw_articles`/`claim_feeds_to_poll`
    /// (§5): the claim and the lock both live inside the single statement, so the row
    /// stays claimed until a later commit rather than becoming re-claimable the instant
    /// `fetch_all` returns.
    pub async fn claim_articles_needing_chunks(
        &self,
        batch_size: i64,
        lease: Duration,
        worker: &str,
    ) -> Result<Vec<ArticleIndex>, StorageError> {
        let lease_secs = lease.as_secs() as f64;
        let rows = sqlx::query(
            r#"
            UPDATE articles_index SET claimed_at = now(), claimed_by = $1
            WHERE article_id IN (
                SELECT article_id FROM articles_index
                WHERE is_canonical
                  AND chunking_status = 'pending'
                  AND (claimed_at IS NULL OR claimed_at < now() - ($2 || ' seconds')::interval)
                ORDER BY article_id
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING article_id, url, canonical_url, source, domain, title_norm, clean_text,
                      text_hash, published_at, is_canonical, canonical_article_id, language
            "#,
        )
        .bind(worker)
        .bind(lease_secs)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(article_index_from_row).collect()
    }

    /// Deletes any pre-existing chunks for `article_id` and bulk-inserts `chunks`, all
    /// in one transaction, then marks the article chunked (§4.4).
    pub async fn replace_chunks(
        &self,
        article_id: i64,
        chunks: &[NewChunk],
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM article_chunks WHERE article_id = $1")
            .bind(article_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO article_chunks
                    (article_id, chunk_index, text, topic, chunk_type, token_estimate)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(article_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.topic)
            .bind(chunk.chunk_type.as_str())
            .bind(chunk.token_estimate)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE articles_index SET chunking_status = 'chunked', claimed_at = NULL,
                    claimed_by = NULL WHERE article_id = $1",
        )
        .bind(article_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn mark_article_chunking_error(&self, article_id: i64) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE articles_index SET chunking_status = 'error', claimed_at = NULL,
                    claimed_by = NULL WHERE article_id = $1",
        )
        .bind(article_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- embedding service --------------------------------------------------

    /// Claims up to `batch_size` chunks with no embedding yet via the same
    /// `UPDATE ... RETURNING` claim protocol as `claim_raw_articles` (§5), so a second
    /// replica can't re-claim the same chunk the instant this call returns.
    pub async fn claim_chunks_needing_embedding(
        &self,
        batch_size: i64,
        lease: Duration,
        worker: &str,
    ) -> Result<Vec<ArticleChunk>, StorageError> {
        let lease_secs = lease.as_secs() as f64;
        let rows = sqlx::query(
            r#"
            UPDATE article_chunks SET claimed_at = now(), claimed_by = $1
            WHERE chunk_id IN (
                SELECT chunk_id FROM article_chunks
                WHERE embedding IS NULL
                  AND (claimed_at IS NULL OR claimed_at < now() - ($2 || ' seconds')::interval)
                ORDER BY chunk_id
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING chunk_id, article_id, chunk_index, text, topic, chunk_type,
                      token_estimate, embedding, fts_vector
            "#,
        )
        .bind(worker)
        .bind(lease_secs)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(article_chunk_from_row).collect()
    }

    /// Writes an embedding vector, refusing any vector whose length disagrees with the
    /// configured `embedding_dim` (SPEC_FULL §4.5, §7: `dimension_mismatch` is terminal).
    pub async fn write_chunk_embedding(
        &self,
        chunk_id: i64,
        embedding: Vec<f32>,
        embedding_dim: usize,
    ) -> Result<(), StorageError> {
        if embedding.len() != embedding_dim {
            return Err(StorageError::DimensionMismatch {
                expected: embedding_dim,
                actual: embedding.len(),
            });
        }

        sqlx::query(
            "UPDATE article_chunks SET embedding = $2, claimed_at = NULL, claimed_by = NULL
             WHERE chunk_id = $1",
        )
        .bind(chunk_id)
        .bind(Vector::from(embedding))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records a failed embedding attempt; at or past `max_attempts` the chunk's
    /// embedding is left permanently null and further claims skip it.
    pub async fn record_embedding_failure(
        &self,
        chunk_id: i64,
        max_attempts: u32,
    ) -> Result<(), StorageError> {
        let row = sqlx::query(
            "UPDATE article_chunks SET embedding_attempt_count = embedding_attempt_count + 1,
                    claimed_at = NULL, claimed_by = NULL
             WHERE chunk_id = $1 RETURNING embedding_attempt_count",
        )
        .bind(chunk_id)
        .fetch_one(&self.pool)
        .await?;
        let attempts: i32 = row.try_get("embedding_attempt_count")?;

        if attempts as u32 >= max_attempts {
            // a zero vector would be indistinguishable from a real embedding under
            // cosine distance checks, so terminal failures stay NULL forever and are
            // excluded from future claims via a sentinel attempt count.
            sqlx::query(
                "UPDATE article_chunks SET embedding_attempt_count = $2 WHERE chunk_id = $1",
            )
            .bind(chunk_id)
            .bind(max_attempts as i32 + 1)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    // ---- fts service --------------------------------------------------

    /// Claims up to `batch_size` chunks with no `fts_vector` yet via the same
    /// `UPDATE ... RETURNING` claim protocol as `claim_raw_articles` (§5). The claim
    /// itself can't also join `articles_index` for the language column, so it runs as a
    /// CTE: the `UPDATE` claims and locks `article_chunks` rows, then the outer `SELECT`
    /// joins in each chunk's article language.
    pub async fn claim_chunks_needing_fts(
        &self,
        batch_size: i64,
        default_language: &str,
        lease: Duration,
        worker: &str,
    ) -> Result<Vec<(i64, String, String)>, StorageError> {
        let lease_secs = lease.as_secs() as f64;
        let rows = sqlx::query(
            r#"
            WITH claimed AS (
                UPDATE article_chunks SET claimed_at = now(), claimed_by = $1
                WHERE chunk_id IN (
                    SELECT chunk_id FROM article_chunks
                    WHERE fts_vector IS NULL
                      AND (claimed_at IS NULL OR claimed_at < now() - ($2 || ' seconds')::interval)
                    ORDER BY chunk_id
                    LIMIT $3
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING chunk_id, article_id, text
            )
            SELECT c.chunk_id, c.text, COALESCE(a.language, $4) AS language
            FROM claimed c
            JOIN articles_index a ON a.article_id = c.article_id
            "#,
        )
        .bind(worker)
        .bind(lease_secs)
        .bind(batch_size)
        .bind(default_language)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok((
                    row.try_get("chunk_id")?,
                    row.try_get("text")?,
                    row.try_get("language")?,
                ))
            })
            .collect()
    }

    pub async fn write_chunk_fts_vector(
        &self,
        chunk_id: i64,
        language: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE article_chunks SET fts_vector = to_tsvector($2::regconfig, text),
                    claimed_at = NULL, claimed_by = NULL
             WHERE chunk_id = $1",
        )
        .bind(chunk_id)
        .bind(language)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- trends --------------------------------------------------

    /// First chunk (by `chunk_index`) with a non-null embedding, per canonical article
    /// published within the window, newest first, capped at `limit` (§4.7 step 1).
    pub async fn fetch_trend_candidates(
        &self,
        window_hours: i64,
        limit: i64,
    ) -> Result<Vec<(i64, String, Vec<f32>, DateTime<Utc>)>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (a.article_id)
                   a.article_id, c.text, c.embedding, a.published_at
            FROM articles_index a
            JOIN article_chunks c ON c.article_id = a.article_id
            WHERE a.is_canonical
              AND c.embedding IS NOT NULL
              AND a.published_at >= now() - ($1 || ' hours')::interval
            ORDER BY a.article_id, c.chunk_index
            "#,
        )
        .bind(window_hours)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let embedding: Vector = row.try_get("embedding")?;
            let published_at: Option<DateTime<Utc>> = row.try_get("published_at")?;
            out.push((
                row.try_get("article_id")?,
                row.try_get("text")?,
                embedding.to_vec(),
                published_at.unwrap_or_else(Utc::now),
            ));
        }

        out.sort_by(|a, b| b.3.cmp(&a.3));
        out.truncate(limit as usize);
        Ok(out)
    }

    // ---- diagnostics / config --------------------------------------------------

    pub async fn record_diagnostic(&self, diagnostic: &Diagnostic) -> Result<(), StorageError> {
        let details = serde_json::to_value(&diagnostic.details)
            .map_err(|e| StorageError::Query(sqlx::Error::Decode(Box::new(e))))?;
        let level = match diagnostic.level {
            newsloom_core::diagnostics::DiagnosticLevel::Info => "info",
            newsloom_core::diagnostics::DiagnosticLevel::Warn => "warn",
            newsloom_core::diagnostics::DiagnosticLevel::Error => "error",
        };
        let component = match diagnostic.component {
            newsloom_core::diagnostics::Component::FeedPoller => "feed_poller",
            newsloom_core::diagnostics::Component::ArticleWorker => "article_worker",
            newsloom_core::diagnostics::Component::ChunkingService => "chunking_service",
            newsloom_core::diagnostics::Component::EmbeddingService => "embedding_service",
            newsloom_core::diagnostics::Component::FtsService => "fts_service",
            newsloom_core::diagnostics::Component::TrendsService => "trends_service",
            newsloom_core::diagnostics::Component::Cli => "cli",
        };

        sqlx::query(
            r#"
            INSERT INTO diagnostics (level, component, message, error_class, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(level)
        .bind(component)
        .bind(&diagnostic.message)
        .bind(diagnostic.error_class.map(|c| c.to_string()))
        .bind(details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_config_entry(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM config_entries WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get("value")?),
            None => None,
        })
    }

    pub async fn set_config_entry(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO config_entries (key, value, updated_at) VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// A `DiagnosticSink` that writes synchronously into Postgres via a blocking handle to
/// the async pool; used where the call site cannot itself be async (rare — most
/// diagnostics are recorded directly via `Repository::record_diagnostic`).
pub struct PgDiagnosticSink {
    repo: Repository,
    handle: tokio::runtime::Handle,
}

impl PgDiagnosticSink {
    pub fn new(repo: Repository, handle: tokio::runtime::Handle) -> Self {
        Self { repo, handle }
    }
}

impl DiagnosticSink for PgDiagnosticSink {
    fn record(
        &self,
        diagnostic: Diagnostic,
    ) -> Result<(), newsloom_core::diagnostics::DiagnosticError> {
        let repo = self.repo.clone();
        self.handle.block_on(async move {
            repo.record_diagnostic(&diagnostic)
                .await
                .map_err(|err| {
                    newsloom_core::diagnostics::DiagnosticError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        err.to_string(),
                    ))
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_carries_chunk_type_as_spec_string() {
        let chunk = NewChunk {
            chunk_index: 0,
            text: "hello".to_string(),
            topic: None,
            chunk_type: ChunkType::Intro,
            token_estimate: 2,
        };
        assert_eq!(chunk.chunk_type.as_str(), "intro");
    }
}
