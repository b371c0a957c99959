//! Retrieval result caching
//!
//! Planning and every generation attempt query the retriever, usually with
//! the same text. Results are cached with moka under a TTL.

use async_trait::async_trait;
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{RetrievalError, SchemaContextProvider};
use crate::query::normalize_text;

/// Cache key: normalized query text plus the requested count
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    query: String,
    k: usize,
}

impl CacheKey {
    fn new(query: &str, k: usize) -> Self {
        Self {
            query: normalize_text(query),
            k,
        }
    }
}

/// Wraps any provider with a TTL cache
pub struct CachedRetriever<P> {
    inner: P,
    cache: Cache<CacheKey, Vec<String>>,
    hits: AtomicU64,
    misses: AtomicU64,
    ttl: Duration,
}

impl<P: SchemaContextProvider> CachedRetriever<P> {
    pub fn new(inner: P, max_entries: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            ttl,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn stats(&self) -> RetrievalCacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        RetrievalCacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

#[async_trait]
impl<P: SchemaContextProvider> SchemaContextProvider for CachedRetriever<P> {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        let key = CacheKey::new(query, k);
        if let Some(snippets) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(snippets);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let snippets = self.inner.retrieve(query, k).await?;
        self.cache.insert(key, snippets.clone());
        Ok(snippets)
    }

    fn cache_stats(&self) -> Option<RetrievalCacheStats> {
        Some(self.stats())
    }
}

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct RetrievalCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
    pub entry_count: u64,
    pub ttl_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticRetriever;

    fn cached() -> CachedRetriever<StaticRetriever> {
        CachedRetriever::new(
            StaticRetriever::new(vec!["employees(id)", "departments(id)"]),
            100,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_repeat_query_hits_cache() {
        let retriever = cached();

        let first = retriever.retrieve("Top earners", 2).await.unwrap();
        let second = retriever.retrieve("  top   EARNERS ", 2).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(retriever.inner().queries().len(), 1);

        let stats = retriever.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_k_is_part_of_key() {
        let retriever = cached();

        assert_eq!(retriever.retrieve("q", 1).await.unwrap().len(), 1);
        assert_eq!(retriever.retrieve("q", 2).await.unwrap().len(), 2);
        assert_eq!(retriever.inner().queries().len(), 2);
    }

    #[tokio::test]
    async fn test_stats_exposed_through_provider() {
        let retriever = cached();
        retriever.retrieve("q", 1).await.unwrap();

        let provider: &dyn SchemaContextProvider = &retriever;
        let stats = provider.cache_stats().unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.ttl_secs, 60);
    }
}
