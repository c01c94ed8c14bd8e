use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use super::WindowCount;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct Expiring<T> {
    value: T,
    expires_at: Option<Instant>,
}

impl<T> Expiring<T> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<String, Expiring<Vec<u8>>>,
    counters: HashMap<String, Expiring<u64>>,
    lists: HashMap<String, VecDeque<String>>,
    last_sweep: Option<Instant>,
}

impl MemoryState {
    // Superseded page versions and idle client counters are never read again,
    // so expiry on read alone would never reclaim them.
    fn sweep_expired(&mut self, now: Instant) {
        if self
            .last_sweep
            .is_some_and(|at| now.saturating_duration_since(at) < SWEEP_INTERVAL)
        {
            return;
        }

        self.values.retain(|_, slot| slot.is_live(now));
        self.counters.retain(|_, slot| slot.is_live(now));
        self.last_sweep = Some(now);
    }
}

/// Process-local store. Each operation runs inside one lock acquisition, which
/// gives the same per-command atomicity the Redis backend provides.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    fn lock(&self) -> anyhow::Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }

    pub fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut state = self.lock()?;
        let now = Instant::now();

        if state.values.get(key).is_some_and(|slot| !slot.is_live(now)) {
            state.values.remove(key);
        }

        Ok(state.values.get(key).map(|slot| slot.value.clone()))
    }

    pub fn set_ex(&self, key: &str, value: Vec<u8>, ttl_seconds: u64) -> anyhow::Result<()> {
        let mut state = self.lock()?;
        let now = Instant::now();
        state.sweep_expired(now);
        let expires_at = now + Duration::from_secs(ttl_seconds.max(1));

        state.values.insert(
            key.to_owned(),
            Expiring {
                value,
                expires_at: Some(expires_at),
            },
        );

        Ok(())
    }

    pub fn del(&self, key: &str) -> anyhow::Result<bool> {
        let mut state = self.lock()?;
        let now = Instant::now();

        let value = state.values.remove(key).is_some_and(|slot| slot.is_live(now));
        let counter = state
            .counters
            .remove(key)
            .is_some_and(|slot| slot.is_live(now));
        let list = state.lists.remove(key).is_some_and(|list| !list.is_empty());

        Ok(value || counter || list)
    }

    pub fn incr(&self, key: &str) -> anyhow::Result<u64> {
        let mut state = self.lock()?;
        let now = Instant::now();

        let slot = state.counters.entry(key.to_owned()).or_insert(Expiring {
            value: 0,
            expires_at: None,
        });
        if !slot.is_live(now) {
            *slot = Expiring {
                value: 0,
                expires_at: None,
            };
        }
        slot.value += 1;

        Ok(slot.value)
    }

    pub fn get_counter(&self, key: &str) -> anyhow::Result<u64> {
        let state = self.lock()?;
        let now = Instant::now();

        Ok(state
            .counters
            .get(key)
            .filter(|slot| slot.is_live(now))
            .map_or(0, |slot| slot.value))
    }

    pub fn incr_with_window(&self, key: &str, window: Duration) -> anyhow::Result<WindowCount> {
        let mut state = self.lock()?;
        let now = Instant::now();
        state.sweep_expired(now);

        let slot = state.counters.entry(key.to_owned()).or_insert(Expiring {
            value: 0,
            expires_at: None,
        });
        if !slot.is_live(now) || slot.expires_at.is_none() {
            *slot = Expiring {
                value: 0,
                expires_at: Some(now + window),
            };
        }
        slot.value += 1;

        let ttl = slot
            .expires_at
            .map_or(window, |at| at.saturating_duration_since(now));

        Ok(WindowCount {
            count: slot.value,
            ttl,
        })
    }

    pub fn lpush(&self, key: &str, value: String) -> anyhow::Result<()> {
        let mut state = self.lock()?;
        state
            .lists
            .entry(key.to_owned())
            .or_default()
            .push_front(value);
        Ok(())
    }

    pub fn llen(&self, key: &str) -> anyhow::Result<u64> {
        let state = self.lock()?;
        Ok(state.lists.get(key).map_or(0, |list| list.len() as u64))
    }

    pub fn lrange(&self, key: &str, start: u64, end: u64) -> anyhow::Result<Vec<String>> {
        let state = self.lock()?;
        let Some(list) = state.lists.get(key) else {
            return Ok(Vec::new());
        };

        let start = usize::try_from(start).unwrap_or(usize::MAX);
        let end = usize::try_from(end).unwrap_or(usize::MAX);
        let take = end.saturating_sub(start).saturating_add(1);

        Ok(list.iter().skip(start).take(take).cloned().collect())
    }

    pub fn lrem_first(&self, key: &str, value: &str) -> anyhow::Result<bool> {
        let mut state = self.lock()?;
        let Some(list) = state.lists.get_mut(key) else {
            return Ok(false);
        };

        let Some(position) = list.iter().position(|item| item == value) else {
            return Ok(false);
        };
        list.remove(position);

        if list.is_empty() {
            state.lists.remove(key);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::MemoryStore;

    #[test]
    fn lists_are_newest_first() {
        let store = MemoryStore::default();
        store.lpush("list", "a".to_owned()).unwrap();
        store.lpush("list", "b".to_owned()).unwrap();
        store.lpush("list", "c".to_owned()).unwrap();

        assert_eq!(store.lrange("list", 0, 0).unwrap(), vec!["c"]);
        assert_eq!(store.lrange("list", 0, 1).unwrap(), vec!["c", "b"]);
        assert_eq!(store.lrange("list", 1, 99).unwrap(), vec!["b", "a"]);
        assert!(store.lrange("list", 5, 10).unwrap().is_empty());
        assert!(store.lrange("missing", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn lrem_removes_single_occurrence() {
        let store = MemoryStore::default();
        store.lpush("list", "dup".to_owned()).unwrap();
        store.lpush("list", "dup".to_owned()).unwrap();

        assert!(store.lrem_first("list", "dup").unwrap());
        assert_eq!(store.lrange("list", 0, 10).unwrap(), vec!["dup"]);
        assert!(store.lrem_first("list", "dup").unwrap());
        assert!(!store.lrem_first("list", "dup").unwrap());
    }

    #[test]
    fn del_reports_existence() {
        let store = MemoryStore::default();
        store.lpush("list", "a".to_owned()).unwrap();

        assert!(store.del("list").unwrap());
        assert!(!store.del("list").unwrap());
    }

    #[test]
    fn persistent_counters() {
        let store = MemoryStore::default();
        assert_eq!(store.get_counter("tag").unwrap(), 0);
        assert_eq!(store.incr("tag").unwrap(), 1);
        assert_eq!(store.incr("tag").unwrap(), 2);
        assert_eq!(store.get_counter("tag").unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn window_counter_resets_after_expiry() {
        let store = MemoryStore::default();
        let window = Duration::from_secs(60);

        assert_eq!(store.incr_with_window("hits", window).unwrap().count, 1);
        tokio::time::advance(Duration::from_secs(20)).await;

        let second = store.incr_with_window("hits", window).unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.ttl, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(41)).await;
        assert_eq!(store.incr_with_window("hits", window).unwrap().count, 1);
    }

    #[test]
    fn list_length() {
        let store = MemoryStore::default();
        assert_eq!(store.llen("list").unwrap(), 0);
        store.lpush("list", "a".to_owned()).unwrap();
        store.lpush("list", "b".to_owned()).unwrap();
        assert_eq!(store.llen("list").unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_keys_are_reclaimed_by_later_writes() {
        let store = MemoryStore::default();
        for version in 0..1000 {
            store
                .set_ex(&format!("test:guestbook:page:v{version}:0:19"), b"[]".to_vec(), 30)
                .unwrap();
            let counter = format!("test:ratelimit:guestbook-write:client:{version}");
            store
                .incr_with_window(&counter, Duration::from_secs(60))
                .unwrap();
        }
        store.incr("test:tag:guestbook").unwrap();

        tokio::time::advance(Duration::from_secs(3600)).await;
        store
            .set_ex("test:guestbook:page:v1000:0:19", b"[]".to_vec(), 30)
            .unwrap();

        let state = store.state.lock().unwrap();
        assert_eq!(state.values.len(), 1);
        assert_eq!(state.counters.len(), 1);
        assert!(state.counters.contains_key("test:tag:guestbook"));
    }

    #[tokio::test(start_paused = true)]
    async fn live_keys_survive_a_sweep() {
        let store = MemoryStore::default();
        store.set_ex("old", b"1".to_vec(), 10).unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        store.set_ex("fresh", b"2".to_vec(), 60).unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        store.set_ex("newest", b"3".to_vec(), 60).unwrap();

        assert_eq!(store.get("fresh").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get("old").unwrap(), None);
        assert_eq!(store.state.lock().unwrap().values.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn values_expire() {
        let store = MemoryStore::default();
        store.set_ex("page", b"[]".to_vec(), 30).unwrap();
        assert_eq!(store.get("page").unwrap(), Some(b"[]".to_vec()));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.get("page").unwrap(), None);
    }
}
