use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Postgres connection settings. `dsn` is the only strictly required value in
/// the whole configuration (SPEC_FULL §6); everything else has a default.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub dsn: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_pool_size() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama3".to_string()
}
fn default_max_chunk_chars() -> usize {
    4000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dim: usize,
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_batch_size() -> usize {
    64
}

/// Cadence and batch size shared by the three continuous services (SPEC_FULL §4.4-4.6).
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceLoopConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
}

fn default_interval_seconds() -> u64 {
    30
}
fn default_batch_size() -> i64 {
    50
}

impl ServiceLoopConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollerConfig {
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_backoff_base_seconds")]
    pub backoff_base_seconds: u64,
    #[serde(default = "default_backoff_cap_seconds")]
    pub backoff_cap_seconds: u64,
    #[serde(default = "default_poll_workers")]
    pub workers: usize,
}

fn default_max_consecutive_failures() -> u32 {
    10
}
fn default_backoff_base_seconds() -> u64 {
    300
}
fn default_backoff_cap_seconds() -> u64 {
    21_600
}
fn default_poll_workers() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_min_clean_text_chars")]
    pub min_clean_text_chars: usize,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_min_clean_text_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendsConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: i64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_eps")]
    pub eps: f32,
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_keyword_count")]
    pub keyword_count: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

fn default_window_hours() -> i64 {
    24
}
fn default_fetch_limit() -> i64 {
    600
}
fn default_top_n() -> usize {
    10
}
fn default_eps() -> f32 {
    0.30
}
fn default_min_samples() -> usize {
    5
}
fn default_keyword_count() -> usize {
    6
}
fn default_cache_ttl_seconds() -> u64 {
    600
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub poller: PollerConfigOrDefault,
    #[serde(default)]
    pub worker: WorkerConfigOrDefault,
    #[serde(default = "default_chunk_loop")]
    pub chunk_loop: ServiceLoopConfig,
    #[serde(default = "default_embed_loop")]
    pub embed_loop: ServiceLoopConfig,
    #[serde(default = "default_fts_loop")]
    pub fts_loop: ServiceLoopConfig,
    #[serde(default)]
    pub trends: TrendsConfigOrDefault,
    #[serde(default = "default_fts_language")]
    pub default_fts_language: String,
}

fn default_fts_language() -> String {
    "english".to_string()
}

fn default_chunk_loop() -> ServiceLoopConfig {
    ServiceLoopConfig {
        interval_seconds: 60,
        batch_size: 25,
    }
}
fn default_embed_loop() -> ServiceLoopConfig {
    ServiceLoopConfig {
        interval_seconds: 15,
        batch_size: 100,
    }
}
fn default_fts_loop() -> ServiceLoopConfig {
    ServiceLoopConfig {
        interval_seconds: 15,
        batch_size: 200,
    }
}

// serde needs a concrete type for `#[serde(default)]` on non-Default structs; these
// thin wrappers exist only so PollerConfig/WorkerConfig/TrendsConfig can be omitted
// wholesale from config files and still deserialize via their own field defaults.
#[derive(Debug, Clone)]
pub struct PollerConfigOrDefault(pub PollerConfig);
#[derive(Debug, Clone)]
pub struct WorkerConfigOrDefault(pub WorkerConfig);
#[derive(Debug, Clone)]
pub struct TrendsConfigOrDefault(pub TrendsConfig);

impl Default for PollerConfigOrDefault {
    fn default() -> Self {
        Self(PollerConfig {
            max_consecutive_failures: default_max_consecutive_failures(),
            backoff_base_seconds: default_backoff_base_seconds(),
            backoff_cap_seconds: default_backoff_cap_seconds(),
            workers: default_poll_workers(),
        })
    }
}
impl Default for WorkerConfigOrDefault {
    fn default() -> Self {
        Self(WorkerConfig {
            max_attempts: default_max_attempts(),
            min_clean_text_chars: default_min_clean_text_chars(),
        })
    }
}
impl Default for TrendsConfigOrDefault {
    fn default() -> Self {
        Self(TrendsConfig {
            window_hours: default_window_hours(),
            fetch_limit: default_fetch_limit(),
            top_n: default_top_n(),
            eps: default_eps(),
            min_samples: default_min_samples(),
            keyword_count: default_keyword_count(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
        })
    }
}

impl<'de> Deserialize<'de> for PollerConfigOrDefault {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        PollerConfig::deserialize(deserializer).map(PollerConfigOrDefault)
    }
}
impl<'de> Deserialize<'de> for WorkerConfigOrDefault {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        WorkerConfig::deserialize(deserializer).map(WorkerConfigOrDefault)
    }
}
impl<'de> Deserialize<'de> for TrendsConfigOrDefault {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        TrendsConfig::deserialize(deserializer).map(TrendsConfigOrDefault)
    }
}

impl AppConfig {
    /// Builds the one immutable configuration value for the whole process.
    ///
    /// Layering, in increasing priority: `config/default.toml`, `config/{RUN_MODE}.toml`
    /// (optional), then `NEWSLOOM_*` environment variables plus the handful of bare
    /// variable names from SPEC_FULL §6 (`PG_DSN`, `OLLAMA_BASE_URL`, ...) that the
    /// original system's operators already know.
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("NEWSLOOM").separator("__"));

        if let Ok(dsn) = env::var("PG_DSN") {
            builder = builder.set_override("database.dsn", dsn)?;
        }
        if let Ok(base_url) = env::var("OLLAMA_BASE_URL") {
            builder = builder.set_override("llm.base_url", base_url)?;
        }
        if let Ok(model) = env::var("OLLAMA_MODEL") {
            builder = builder.set_override("llm.model", model)?;
        }
        if let Ok(model) = env::var("EMBEDDING_MODEL") {
            builder = builder.set_override("embedding.model", model)?;
        }
        if let Ok(dim) = env::var("EMBEDDING_DIM") {
            let dim: i64 = dim.parse().map_err(|_| {
                ConfigError::Message("EMBEDDING_DIM must be an integer".to_string())
            })?;
            builder = builder.set_override("embedding.dim", dim)?;
        }
        if let Ok(batch) = env::var("EMBEDDING_BATCH_SIZE") {
            let batch: i64 = batch.parse().map_err(|_| {
                ConfigError::Message("EMBEDDING_BATCH_SIZE must be an integer".to_string())
            })?;
            builder = builder.set_override("embedding.batch_size", batch)?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_loop_interval_converts_seconds() {
        let cfg = ServiceLoopConfig {
            interval_seconds: 45,
            batch_size: 10,
        };
        assert_eq!(cfg.interval(), Duration::from_secs(45));
    }

    #[test]
    fn poller_defaults_match_spec() {
        let defaults = PollerConfigOrDefault::default().0;
        assert_eq!(defaults.max_consecutive_failures, 10);
        assert_eq!(defaults.backoff_base_seconds, 300);
        assert_eq!(defaults.backoff_cap_seconds, 21_600);
    }

    #[test]
    fn trends_defaults_match_spec() {
        let defaults = TrendsConfigOrDefault::default().0;
        assert_eq!(defaults.eps, 0.30);
        assert_eq!(defaults.min_samples, 5);
        assert_eq!(defaults.fetch_limit, 600);
        assert_eq!(defaults.cache_ttl_seconds, 600);
    }
}
