// Time-boxed result cache.
//
// Loaded datasets are kept per fetch-parameter key until the TTL runs out or
// the user asks for a refresh. Time is passed in explicitly by the `_at`
// variants so expiry can be tested without sleeping.
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

#[derive(Debug, Clone)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, Entry<V>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Value for `key` if it was fetched less than one TTL before `now`.
    /// Expired entries are evicted on lookup.
    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let fresh = match self.entries.get(key) {
            Some(e) => now.saturating_duration_since(e.fetched_at) < self.ttl,
            None => return None,
        };
        if !fresh {
            debug!("cache entry expired");
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    /// When the cached value for `key` was fetched, if any.
    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, fetched_at: Instant) {
        self.entries.insert(key, Entry { value, fetched_at });
    }

    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached value, or the result of `load` which is then cached. A failed
    /// load leaves the cache untouched.
    pub fn get_or_try_insert_with<E, F>(&mut self, key: &K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let now = Instant::now();
        if let Some(v) = self.get_at(key, now) {
            debug!("cache hit");
            return Ok(v);
        }
        debug!("cache miss");
        let value = load()?;
        self.insert_at(key.clone(), value.clone(), Instant::now());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        let t0 = Instant::now();
        cache.insert_at("k", 1, t0);
        assert_eq!(cache.get_at(&"k", t0 + Duration::from_secs(299)), Some(1));
        assert_eq!(cache.get_at(&"k", t0 + Duration::from_secs(300)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_forces_reload() {
        let mut cache = TtlCache::new(Duration::from_secs(300));
        let mut loads = 0;
        for _ in 0..3 {
            let v: Result<i32, ()> = cache.get_or_try_insert_with(&"k", || {
                loads += 1;
                Ok(7)
            });
            assert_eq!(v, Ok(7));
        }
        assert_eq!(loads, 1);

        assert!(cache.invalidate(&"k"));
        assert!(!cache.invalidate(&"k"));
        let _ = cache.get_or_try_insert_with(&"k", || -> Result<i32, ()> {
            loads += 1;
            Ok(8)
        });
        assert_eq!(loads, 2);
        assert_eq!(cache.get(&"k"), Some(8));
    }

    #[test]
    fn failed_load_is_not_cached() {
        let mut cache: TtlCache<&str, i32> = TtlCache::new(Duration::from_secs(300));
        let r = cache.get_or_try_insert_with(&"k", || Err("boom"));
        assert_eq!(r, Err("boom"));
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_independent() {
        let mut cache = TtlCache::new(Duration::from_secs(60));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        cache.clear();
        assert_eq!(cache.len(), 0);
    }
}
