//! Caching layer for market data to reduce API calls

use cached::{Cached, TimedCache};
use chrono::NaiveDate;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key for one downloaded price series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SeriesKey {
    pub fn new(symbol: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            start,
            end,
        }
    }
}

/// Thread-safe cache whose entries expire after a fixed lifespan
///
/// Clones share the same storage.
pub struct StockCache<K, V> {
    cache: Arc<RwLock<TimedCache<K, V>>>,
}

impl<K, V> StockCache<K, V>
where
    K: Hash + Eq + Clone + std::fmt::Debug,
    V: Clone,
{
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        // expiry bookkeeping needs a write lock even for reads
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: K, value: V) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value, or fetch and cache it
    ///
    /// Failed fetches are not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!(?key, "Cache hit");
            return Ok(value);
        }

        tracing::debug!(?key, "Cache miss");
        let value = fetcher().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> Clone for StockCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(symbol: &str) -> SeriesKey {
        let day = |d| NaiveDate::from_ymd_opt(2024, 8, d).unwrap();
        SeriesKey::new(symbol, day(1), day(8))
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = StockCache::new(Duration::from_secs(60));
        cache.insert(key("AAPL"), 150.0).await;

        assert_eq!(cache.get(&key("AAPL")).await, Some(150.0));
        assert_eq!(cache.get(&key("MSFT")).await, None);
    }

    #[tokio::test]
    async fn test_cache_get_or_fetch() {
        let cache = StockCache::new(Duration::from_secs(60));

        let mut call_count = 0;
        let result = cache
            .get_or_fetch(key("AAPL"), || {
                call_count += 1;
                async { Ok::<_, String>(150.0) }
            })
            .await
            .unwrap();
        assert_eq!(result, 150.0);

        let result = cache
            .get_or_fetch(key("AAPL"), || {
                call_count += 1;
                async { Ok::<_, String>(999.0) }
            })
            .await
            .unwrap();
        assert_eq!(result, 150.0);
        assert_eq!(call_count, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache: StockCache<SeriesKey, f64> = StockCache::new(Duration::from_secs(60));

        let err = cache
            .get_or_fetch(key("ZZZZ"), || async { Err::<f64, _>("unknown symbol") })
            .await;
        assert!(err.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = StockCache::new(Duration::from_secs(60));
        let clone = cache.clone();
        clone.insert(key("AAPL"), 1.0).await;
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(clone.is_empty().await);
    }
}
