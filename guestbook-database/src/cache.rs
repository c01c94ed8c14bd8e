use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::store::KvStore;

pub const DEFAULT_PAGE_CACHE_TTL: Duration = Duration::from_secs(30);

/// Tag shared by every cached page of the entry list.
pub const ENTRIES_TAG: &str = "guestbook";

#[derive(Clone, Debug)]
enum CacheBackend {
    Disabled,
    Store(KvStore),
}

#[derive(Clone, Debug)]
pub struct CacheService {
    key_prefix: String,
    backend: CacheBackend,
    page_ttl: Duration,
}

impl CacheService {
    pub fn disabled(prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: prefix.into(),
            backend: CacheBackend::Disabled,
            page_ttl: DEFAULT_PAGE_CACHE_TTL,
        }
    }

    pub fn new(store: KvStore, prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: prefix.into(),
            backend: CacheBackend::Store(store),
            page_ttl: DEFAULT_PAGE_CACHE_TTL,
        }
    }

    pub fn configure_page_ttl(&mut self, ttl: Duration) {
        self.page_ttl = ttl.max(Duration::from_secs(1));
    }

    pub fn page_ttl(&self) -> Duration {
        self.page_ttl
    }

    pub fn key(&self, suffix: impl AsRef<str>) -> String {
        format!("{}:{}", self.key_prefix, suffix.as_ref())
    }

    pub async fn get_json<T>(&self, key: &str) -> anyhow::Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let value = match &self.backend {
            CacheBackend::Disabled => return Ok(None),
            CacheBackend::Store(store) => store.get(key).await?,
        };

        match value {
            Some(bytes) => {
                let parsed = serde_json::from_slice(&bytes).map_err(|e| {
                    anyhow::anyhow!("failed to deserialize cache value for `{key}`: {e}")
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    pub async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> anyhow::Result<()>
    where
        T: Serialize,
    {
        let CacheBackend::Store(store) = &self.backend else {
            return Ok(());
        };

        let payload = serde_json::to_vec(value)
            .map_err(|e| anyhow::anyhow!("failed to serialize cache value for `{key}`: {e}"))?;

        store.set_ex(key, payload, ttl.as_secs().max(1)).await
    }

    pub async fn get_or_load_json<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        loader: F,
    ) -> anyhow::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        match self.get_json::<T>(key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!(?e, cache_key = key, "cache get failed; falling back to store"),
        }

        let loaded = loader().await?;

        if let Err(e) = self.set_json(key, &loaded, ttl).await {
            warn!(?e, cache_key = key, "cache set failed; returning store value");
        }

        Ok(loaded)
    }

    /// Current version of a tag. Cached keys embed it, so bumping the version
    /// strands every key built from the old one.
    pub async fn tag_version(&self, tag: &str) -> anyhow::Result<u64> {
        match &self.backend {
            CacheBackend::Disabled => Ok(0),
            CacheBackend::Store(store) => store.get_counter(&self.tag_key(tag)).await,
        }
    }

    /// Mark everything cached under `tag` stale, effective for the next read.
    pub async fn invalidate_tag(&self, tag: &str) -> anyhow::Result<()> {
        if let CacheBackend::Store(store) = &self.backend {
            store.incr(&self.tag_key(tag)).await?;
        }
        Ok(())
    }

    fn tag_key(&self, tag: &str) -> String {
        self.key(format!("tag:{tag}"))
    }
}

pub fn entries_page_key(cache: &CacheService, version: u64, start: u64, end: u64) -> String {
    cache.key(format!("{ENTRIES_TAG}:page:v{version}:{start}:{end}"))
}

pub async fn invalidate_entries(cache: &CacheService) -> anyhow::Result<()> {
    cache.invalidate_tag(ENTRIES_TAG).await
}
