//! Plain entity types shared by every crate. Kept free of any storage-layer
//! dependency (no `sqlx` here) so `ingestion`/`jobs`/`query` can share these shapes
//! without pulling in a database driver; `storage` maps rows onto them by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Active,
    Disabled,
    Error,
}

impl FeedStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedStatus::Active => "active",
            FeedStatus::Disabled => "disabled",
            FeedStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub feed_id: i64,
    pub url: String,
    pub status: FeedStatus,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_etag: Option<String>,
    pub last_modified: Option<String>,
    pub consecutive_failure_count: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawArticleStatus {
    Pending,
    Fetching,
    Stored,
    Duplicate,
    Error,
}

impl RawArticleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RawArticleStatus::Pending => "pending",
            RawArticleStatus::Fetching => "fetching",
            RawArticleStatus::Stored => "stored",
            RawArticleStatus::Duplicate => "duplicate",
            RawArticleStatus::Error => "error",
        }
    }

    /// Whether this status is a dead end for the article worker's retry loop.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RawArticleStatus::Stored | RawArticleStatus::Duplicate | RawArticleStatus::Error
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawArticle {
    pub raw_article_id: i64,
    pub feed_id: i64,
    pub url: String,
    pub url_hash: String,
    pub guid: Option<String>,
    pub source_domain: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub status: RawArticleStatus,
    pub attempt_count: i32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleIndex {
    pub article_id: i64,
    pub url: String,
    pub canonical_url: String,
    pub source: String,
    pub domain: String,
    pub title_norm: String,
    pub clean_text: String,
    pub text_hash: String,
    pub published_at: Option<DateTime<Utc>>,
    pub is_canonical: bool,
    pub canonical_article_id: Option<i64>,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Intro,
    Body,
    Conclusion,
    Other,
}

impl ChunkType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkType::Intro => "intro",
            ChunkType::Body => "body",
            ChunkType::Conclusion => "conclusion",
            ChunkType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleChunk {
    pub chunk_id: i64,
    pub article_id: i64,
    pub chunk_index: i32,
    pub text: String,
    pub topic: Option<String>,
    pub chunk_type: ChunkType,
    pub token_estimate: i32,
    /// `None` until the embedding service fills it; length must equal the
    /// configured `EMBEDDING_DIM` once set (§4.5, §7).
    pub embedding: Option<Vec<f32>>,
    pub has_fts_vector: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// A single trend result produced by the clustering/scoring pipeline (§4.7); not a
/// durable entity, just the shape the CLI/API returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub cluster_id: usize,
    pub size: usize,
    pub keywords: Vec<String>,
    pub momentum: f32,
    pub burst_intensity: f32,
    pub score: f32,
    pub sample_article_ids: Vec<i64>,
    pub extra: HashMap<String, String>,
}
