use std::collections::HashMap;
use std::time::{Duration, Instant};

use newsloom_core::domain::Trend;

/// Exact-key TTL cache for trend results, keyed on `(window, limit, top_n)` (§4.7's
/// "Cache shape" note). Unlike `SemanticCache`, keys here are already canonical, so
/// lookup is a plain map-get plus a TTL check; capacity-based eviction only bounds
/// memory when many distinct triples are requested, it is not a relevance mechanism.
#[derive(Debug, Clone)]
pub struct TrendsCacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

struct Entry {
    value: Vec<Trend>,
    inserted_at: Instant,
    last_accessed: Instant,
}

pub struct TrendsCache {
    config: TrendsCacheConfig,
    entries: HashMap<String, Entry>,
}

impl TrendsCache {
    pub fn new(config: TrendsCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
        }
    }

    pub fn key(window_hours: i64, limit: i64, top_n: usize) -> String {
        format!("trends:{window_hours}:{limit}:{top_n}")
    }

    pub fn get(&mut self, key: &str) -> Option<Vec<Trend>> {
        let expired = self
            .entries
            .get(key)
            .map(|entry| entry.inserted_at.elapsed() > self.config.ttl)
            .unwrap_or(false);
        if expired {
            self.entries.remove(key);
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.last_accessed = Instant::now();
        Some(entry.value.clone())
    }

    pub fn insert(&mut self, key: String, value: Vec<Trend>) {
        if self.config.max_entries == 0 {
            return;
        }
        while self.entries.len() >= self.config.max_entries && !self.entries.contains_key(&key) {
            self.evict_lru();
        }
        let now = Instant::now();
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                last_accessed: now,
            },
        );
    }

    fn evict_lru(&mut self) {
        let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_accessed)
            .map(|(key, _)| key.clone())
        else {
            return;
        };
        self.entries.remove(&oldest_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn trend(cluster_id: usize) -> Trend {
        Trend {
            cluster_id,
            size: 1,
            keywords: vec![],
            momentum: 0.0,
            burst_intensity: 0.0,
            score: 0.0,
            sample_article_ids: vec![],
            extra: StdHashMap::new(),
        }
    }

    #[test]
    fn cache_hits_for_identical_key() {
        let mut cache = TrendsCache::new(TrendsCacheConfig {
            ttl: Duration::from_secs(600),
            max_entries: 16,
        });
        let key = TrendsCache::key(24, 600, 10);
        cache.insert(key.clone(), vec![trend(1)]);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn cache_misses_for_a_different_key() {
        let mut cache = TrendsCache::new(TrendsCacheConfig {
            ttl: Duration::from_secs(600),
            max_entries: 16,
        });
        cache.insert(TrendsCache::key(24, 600, 10), vec![trend(1)]);
        assert!(cache.get(&TrendsCache::key(48, 600, 10)).is_none());
    }

    #[test]
    fn cache_entry_expires_after_ttl() {
        let mut cache = TrendsCache::new(TrendsCacheConfig {
            ttl: Duration::from_millis(10),
            max_entries: 16,
        });
        let key = TrendsCache::key(24, 600, 10);
        cache.insert(key.clone(), vec![trend(1)]);
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn cache_evicts_least_recently_used_past_capacity() {
        let mut cache = TrendsCache::new(TrendsCacheConfig {
            ttl: Duration::from_secs(600),
            max_entries: 2,
        });
        cache.insert("a".to_string(), vec![trend(1)]);
        cache.insert("b".to_string(), vec![trend(2)]);
        cache.get("a");
        cache.insert("c".to_string(), vec![trend(3)]);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }
}
