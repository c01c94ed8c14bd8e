use crate::cache::CacheService;
use crate::model::rate_limit::{RateLimitPolicy, RateLimits};
use crate::store::KvStore;

/// Shared database handle passed across crates.
#[derive(Clone, Debug)]
pub struct Database {
    store: KvStore,
    cache: CacheService,
    key_prefix: String,
    rate_limits: RateLimits,
}

impl Database {
    /// Create a database handle over a store, with every read going straight to the store.
    pub fn new(store: KvStore, prefix: impl Into<String>) -> Self {
        let key_prefix = prefix.into();
        Self {
            store,
            cache: CacheService::disabled(key_prefix.clone()),
            key_prefix,
            rate_limits: RateLimits::default(),
        }
    }

    /// Create a database handle from a store and cache service.
    pub fn with_cache(store: KvStore, cache: CacheService, prefix: impl Into<String>) -> Self {
        Self {
            store,
            cache,
            key_prefix: prefix.into(),
            rate_limits: RateLimits::default(),
        }
    }

    /// In-memory database with the page cache enabled on the same store.
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        let key_prefix = prefix.into();
        let store = KvStore::memory();
        let cache = CacheService::new(store.clone(), key_prefix.clone());
        Self::with_cache(store, cache, key_prefix)
    }

    pub fn configure_rate_limit(&mut self, policy: RateLimitPolicy) {
        self.rate_limits.set(policy);
    }

    /// Expose the underlying store for query modules.
    pub fn store(&self) -> &KvStore {
        &self.store
    }

    /// Expose the cache service for query modules.
    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    pub fn rate_limits(&self) -> &RateLimits {
        &self.rate_limits
    }

    pub fn key(&self, suffix: impl AsRef<str>) -> String {
        format!("{}:{}", self.key_prefix, suffix.as_ref())
    }
}
