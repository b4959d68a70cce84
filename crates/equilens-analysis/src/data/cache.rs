//! Lookaside cache in front of the data source manager
//!
//! Entries store the full fetch result including provenance, so a cache
//! hit re-serves the original attempt trail rather than inventing a new
//! one.

use crate::data::RequestKind;
use cached::{Cached, TimedCache};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key for data requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Ticker symbol
    pub symbol: String,
    /// What was fetched
    pub request: RequestKind,
    /// Request parameters as JSON string
    pub params: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(symbol: impl Into<String>, request: RequestKind, params: impl Serialize) -> Self {
        Self {
            symbol: symbol.into(),
            request,
            params: serde_json::to_string(&params).unwrap_or_default(),
        }
    }
}

/// Thread-safe timed cache for fetched payloads
pub struct DataCache {
    cache: Arc<RwLock<TimedCache<CacheKey, serde_json::Value>>>,
}

impl DataCache {
    /// Create a new cache with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    /// Insert a value into the cache
    pub async fn insert(&self, key: CacheKey, value: serde_json::Value) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Invalidate a specific cache entry
    pub async fn invalidate(&self, key: &CacheKey) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(key);
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for DataCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

/// Per-request-kind caches with independent TTLs
///
/// Statements and profiles change on reporting cadence, prices move
/// intraday, so the price cache gets a much shorter lifespan.
pub struct CacheManager {
    statements: DataCache,
    profile: DataCache,
    prices: DataCache,
}

impl CacheManager {
    /// Create a cache manager with one TTL per request kind
    pub fn new(statements_ttl: Duration, profile_ttl: Duration, prices_ttl: Duration) -> Self {
        Self {
            statements: DataCache::new(statements_ttl),
            profile: DataCache::new(profile_ttl),
            prices: DataCache::new(prices_ttl),
        }
    }

    /// The cache backing one request kind
    pub fn for_kind(&self, request: RequestKind) -> &DataCache {
        match request {
            RequestKind::FinancialStatements => &self.statements,
            RequestKind::CompanyInfo => &self.profile,
            RequestKind::PriceHistory => &self.prices,
        }
    }

    /// Clear all caches
    pub async fn clear_all(&self) {
        self.statements.clear().await;
        self.profile.clear().await;
        self.prices.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_key_creation() {
        let key = CacheKey::new(
            "AAPL",
            RequestKind::PriceHistory,
            serde_json::json!({"start": "2023-01-01"}),
        );
        assert_eq!(key.symbol, "AAPL");
        assert_eq!(key.request, RequestKind::PriceHistory);
        assert!(key.params.contains("start"));
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = DataCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AAPL", RequestKind::CompanyInfo, serde_json::json!({}));
        let value = serde_json::json!({"symbol": "AAPL"});

        cache.insert(key.clone(), value.clone()).await;

        assert_eq!(cache.get(&key).await, Some(value));
    }

    #[tokio::test]
    async fn test_cache_miss_for_different_key() {
        let cache = DataCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AAPL", RequestKind::CompanyInfo, serde_json::json!({}));
        cache.insert(key, serde_json::json!({"symbol": "AAPL"})).await;

        let other = CacheKey::new("MSFT", RequestKind::CompanyInfo, serde_json::json!({}));
        assert!(cache.get(&other).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_invalidation() {
        let cache = DataCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AAPL", RequestKind::CompanyInfo, serde_json::json!({}));

        cache.insert(key.clone(), serde_json::json!({})).await;
        assert!(cache.get(&key).await.is_some());

        cache.invalidate(&key).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_cache_manager_kinds_are_independent() {
        let manager = CacheManager::new(
            Duration::from_secs(3600),
            Duration::from_secs(3600),
            Duration::from_secs(300),
        );

        let key = CacheKey::new("AAPL", RequestKind::FinancialStatements, serde_json::json!({}));
        manager
            .for_kind(RequestKind::FinancialStatements)
            .insert(key.clone(), serde_json::json!({"periods": 2}))
            .await;

        assert!(manager
            .for_kind(RequestKind::FinancialStatements)
            .get(&key)
            .await
            .is_some());
        assert!(manager.for_kind(RequestKind::CompanyInfo).get(&key).await.is_none());

        manager.clear_all().await;
        assert!(manager.for_kind(RequestKind::FinancialStatements).is_empty().await);
    }
}
