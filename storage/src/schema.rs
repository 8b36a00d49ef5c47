use sqlx::PgPool;

use crate::error::StorageError;

/// Idempotently creates every table and index this system needs (SPEC_FULL §3, §6).
/// Safe to call on every process start; this is the body of the `ensure` CLI subcommand.
///
/// `embedding_dim` is baked into the `article_chunks.embedding` column type because pgvector
/// needs a fixed dimension to build an `ivfflat` index; it must match the configured
/// `EMBEDDING_DIM` (§9) for the lifetime of the database.
pub async fn ensure_schema(pool: &PgPool, embedding_dim: usize) -> Result<(), StorageError> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS feeds (
            feed_id BIGSERIAL PRIMARY KEY,
            url TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'disabled', 'error')),
            next_poll_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            last_fetched_at TIMESTAMPTZ,
            last_etag TEXT,
            last_modified TEXT,
            consecutive_failure_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw (
            raw_article_id BIGSERIAL PRIMARY KEY,
            feed_id BIGINT NOT NULL REFERENCES feeds(feed_id),
            url TEXT NOT NULL,
            url_hash TEXT NOT NULL UNIQUE,
            guid TEXT,
            source_domain TEXT NOT NULL,
            title TEXT,
            summary TEXT,
            published_at TIMESTAMPTZ,
            fetched_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'fetching', 'stored', 'duplicate', 'error')),
            attempt_count INTEGER NOT NULL DEFAULT 0,
            next_attempt_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            last_error TEXT,
            canonical_article_id BIGINT,
            claimed_at TIMESTAMPTZ,
            claimed_by TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles_index (
            article_id BIGSERIAL PRIMARY KEY,
            url TEXT NOT NULL,
            canonical_url TEXT NOT NULL,
            source TEXT NOT NULL,
            domain TEXT NOT NULL,
            title_norm TEXT NOT NULL,
            clean_text TEXT NOT NULL,
            text_hash TEXT NOT NULL,
            published_at TIMESTAMPTZ,
            is_canonical BOOLEAN NOT NULL DEFAULT true,
            canonical_article_id BIGINT REFERENCES articles_index(article_id),
            language TEXT NOT NULL DEFAULT 'english',
            chunking_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (chunking_status IN ('pending', 'chunked', 'error')),
            claimed_at TIMESTAMPTZ,
            claimed_by TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS articles_index_text_hash_canonical_idx
        ON articles_index (text_hash) WHERE is_canonical
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS articles_index_published_at_idx
        ON articles_index (published_at DESC)
        "#,
    )
    .execute(pool)
    .await?;

    let create_chunks = format!(
        r#"
        CREATE TABLE IF NOT EXISTS article_chunks (
            chunk_id BIGSERIAL PRIMARY KEY,
            article_id BIGINT NOT NULL REFERENCES articles_index(article_id),
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            topic TEXT,
            chunk_type TEXT NOT NULL DEFAULT 'other'
                CHECK (chunk_type IN ('intro', 'body', 'conclusion', 'other')),
            token_estimate INTEGER NOT NULL DEFAULT 0,
            embedding vector({embedding_dim}),
            embedding_attempt_count INTEGER NOT NULL DEFAULT 0,
            fts_vector tsvector,
            claimed_at TIMESTAMPTZ,
            claimed_by TEXT,
            UNIQUE (article_id, chunk_index)
        )
        "#
    );
    sqlx::query(&create_chunks).execute(pool).await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS article_chunks_fts_vector_idx
        ON article_chunks USING GIN (fts_vector)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS article_chunks_embedding_idx
        ON article_chunks USING ivfflat (embedding vector_cosine_ops)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS diagnostics (
            sequence BIGSERIAL PRIMARY KEY,
            level TEXT NOT NULL CHECK (level IN ('info', 'warn', 'error')),
            component TEXT NOT NULL,
            message TEXT NOT NULL,
            error_class TEXT,
            details JSONB NOT NULL DEFAULT '{}'::jsonb,
            occurred_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS config_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
