pub mod cache;
pub mod request;
pub mod trends;

use std::sync::Mutex;

use newsloom_core::config::TrendsConfig;
use newsloom_core::domain::Trend;
use storage::Repository;

pub use cache::{TrendsCache, TrendsCacheConfig};
pub use request::{RequestError, TrendsRequest};

/// Caching facade over [`trends::build_trends`]: serves a cache hit when one exists,
/// otherwise builds fresh trends and populates the cache for the next caller.
pub struct TrendsService {
    repo: Repository,
    config: TrendsConfig,
    cache: Mutex<TrendsCache>,
}

impl TrendsService {
    pub fn new(repo: Repository, config: TrendsConfig) -> Self {
        let cache = TrendsCache::new(TrendsCacheConfig {
            ttl: std::time::Duration::from_secs(config.cache_ttl_seconds),
            max_entries: 64,
        });
        Self {
            repo,
            config,
            cache: Mutex::new(cache),
        }
    }

    pub async fn get(&self, request: TrendsRequest) -> Result<Vec<Trend>, storage::StorageError> {
        let key = request.cache_key();
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return Ok(cached);
        }

        let config = TrendsConfig {
            window_hours: request.window_hours,
            ..self.config.clone()
        };
        let trends = trends::build_trends(&self.repo, &config, request.limit, request.top_n).await?;
        self.cache.lock().unwrap().insert(key, trends.clone());
        Ok(trends)
    }
}
