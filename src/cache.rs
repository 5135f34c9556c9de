use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// cached response containing status code, headers, and body
#[derive(Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// read-through cache store consulted before any origin fetch.
///
/// the handler owns only the populate policy; eviction and expiry belong
/// to the backing store. the store is injected into the handler state so
/// tests can substitute an in-memory double.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// retrieves a cached response by key
    async fn lookup(&self, key: &str) -> Option<Arc<CachedResponse>>;

    /// stores a response wholesale under the key, replacing any previous
    /// entry. concurrent populates for the same key are last-write-wins.
    async fn populate(&self, key: String, response: Arc<CachedResponse>);

    /// number of entries currently held
    async fn len(&self) -> u64;
}

/// production store backed by moka with configurable size and ttl
pub struct MokaStore {
    cache: Cache<String, Arc<CachedResponse>>,
}

impl MokaStore {
    /// creates a store with a size limit (in mb) and ttl (in seconds)
    pub fn new(size_mb: u64, ttl_seconds: u64) -> Self {
        // convert mb to estimated item count (rough approximation)
        // assumption: average cached item is ~10kb including headers and metadata
        let max_capacity = (size_mb * 1024 * 1024) / (10 * 1024);

        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_seconds))
            .build();

        Self { cache }
    }
}

#[async_trait]
impl CacheStore for MokaStore {
    async fn lookup(&self, key: &str) -> Option<Arc<CachedResponse>> {
        self.cache.get(key).await
    }

    async fn populate(&self, key: String, response: Arc<CachedResponse>) {
        self.cache.insert(key, response).await;
    }

    async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::{Notify, RwLock};

    /// in-memory double for handler tests. `populated` is notified after
    /// every write so a test can observe the detached populate complete
    /// even though the response returned first.
    pub struct MemoryStore {
        entries: RwLock<HashMap<String, Arc<CachedResponse>>>,
        pub populated: Notify,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self {
                entries: RwLock::new(HashMap::new()),
                populated: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl CacheStore for MemoryStore {
        async fn lookup(&self, key: &str) -> Option<Arc<CachedResponse>> {
            self.entries.read().await.get(key).cloned()
        }

        async fn populate(&self, key: String, response: Arc<CachedResponse>) {
            self.entries.write().await.insert(key, response);
            self.populated.notify_one();
        }

        async fn len(&self) -> u64 {
            self.entries.read().await.len() as u64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(body: &'static str) -> Arc<CachedResponse> {
        Arc::new(CachedResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        })
    }

    #[tokio::test]
    async fn lookup_misses_on_a_cold_store() {
        let store = MokaStore::new(8, 60);
        assert!(store.lookup("https://edge.test/proxy/abc").await.is_none());
    }

    #[tokio::test]
    async fn populate_then_lookup_returns_the_same_bytes() {
        let store = MokaStore::new(8, 60);
        let key = "https://edge.test/proxy/abc".to_string();
        store.populate(key.clone(), entry("png-bytes")).await;

        let found = store.lookup(&key).await.expect("entry should be present");
        assert_eq!(found.status, StatusCode::OK);
        assert_eq!(found.body.as_ref(), b"png-bytes");
    }

    #[tokio::test]
    async fn populate_replaces_entries_wholesale() {
        let store = MokaStore::new(8, 60);
        let key = "https://edge.test/proxy/abc".to_string();
        store.populate(key.clone(), entry("first")).await;
        store.populate(key.clone(), entry("second")).await;

        let found = store.lookup(&key).await.expect("entry should be present");
        assert_eq!(found.body.as_ref(), b"second");
    }
}
