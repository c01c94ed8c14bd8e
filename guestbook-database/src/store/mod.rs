mod memory_store;
mod redis_store;

use std::time::Duration;

use memory_store::MemoryStore;
use redis_store::RedisStore;

/// Counter value and time left before it expires, as returned by
/// [`KvStore::incr_with_window`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u64,
    pub ttl: Duration,
}

#[derive(Clone, Debug)]
enum StoreBackend {
    Memory(MemoryStore),
    Redis(RedisStore),
}

/// Key-value store holding the entry list, rate-limit counters and cached pages.
///
/// Every primitive is atomic at the store; callers never read-modify-write.
#[derive(Clone, Debug)]
pub struct KvStore {
    backend: StoreBackend,
}

impl KvStore {
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory(MemoryStore::default()),
        }
    }

    pub fn redis(redis_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            backend: StoreBackend::Redis(RedisStore::from_url(redis_url)?),
        })
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        match &self.backend {
            StoreBackend::Memory(_) => Ok(()),
            StoreBackend::Redis(store) => store.ping().await,
        }
    }

    pub async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        match &self.backend {
            StoreBackend::Memory(store) => store.get(key),
            StoreBackend::Redis(store) => store.get(key).await,
        }
    }

    pub async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> anyhow::Result<()> {
        match &self.backend {
            StoreBackend::Memory(store) => store.set_ex(key, value, ttl_seconds),
            StoreBackend::Redis(store) => store.set_ex(key, value, ttl_seconds).await,
        }
    }

    /// Delete a key of any kind. Returns whether it existed.
    pub async fn del(&self, key: &str) -> anyhow::Result<bool> {
        match &self.backend {
            StoreBackend::Memory(store) => store.del(key),
            StoreBackend::Redis(store) => store.del(key).await,
        }
    }

    /// Increment a persistent counter and return the new value.
    pub async fn incr(&self, key: &str) -> anyhow::Result<u64> {
        match &self.backend {
            StoreBackend::Memory(store) => store.incr(key),
            StoreBackend::Redis(store) => store.incr(key).await,
        }
    }

    /// Read a counter, treating a missing key as zero.
    pub async fn get_counter(&self, key: &str) -> anyhow::Result<u64> {
        match &self.backend {
            StoreBackend::Memory(store) => store.get_counter(key),
            StoreBackend::Redis(store) => store.get_counter(key).await,
        }
    }

    /// Increment a counter that expires `window` after its first hit.
    pub async fn incr_with_window(&self, key: &str, window: Duration) -> anyhow::Result<WindowCount> {
        match &self.backend {
            StoreBackend::Memory(store) => store.incr_with_window(key, window),
            StoreBackend::Redis(store) => store.incr_with_window(key, window).await,
        }
    }

    /// Prepend a value to the head of a list.
    pub async fn lpush(&self, key: &str, value: String) -> anyhow::Result<()> {
        match &self.backend {
            StoreBackend::Memory(store) => store.lpush(key, value),
            StoreBackend::Redis(store) => store.lpush(key, value).await,
        }
    }

    /// Number of elements in a list; a missing key counts as empty.
    pub async fn llen(&self, key: &str) -> anyhow::Result<u64> {
        match &self.backend {
            StoreBackend::Memory(store) => store.llen(key),
            StoreBackend::Redis(store) => store.llen(key).await,
        }
    }

    /// Inclusive index range from the head. An `end` past the tail is clamped.
    pub async fn lrange(&self, key: &str, start: u64, end: u64) -> anyhow::Result<Vec<String>> {
        if start > end {
            return Ok(Vec::new());
        }

        match &self.backend {
            StoreBackend::Memory(store) => store.lrange(key, start, end),
            StoreBackend::Redis(store) => store.lrange(key, start, end).await,
        }
    }

    /// Remove the first element equal to `value`. Returns whether one was removed.
    pub async fn lrem_first(&self, key: &str, value: &str) -> anyhow::Result<bool> {
        match &self.backend {
            StoreBackend::Memory(store) => store.lrem_first(key, value),
            StoreBackend::Redis(store) => store.lrem_first(key, value).await,
        }
    }
}
