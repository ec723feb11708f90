use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::clock::Clock;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
}

/// In-memory cache where entries expire after a fixed TTL measured on the
/// injected [`Clock`].
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        // A negative age (clock moved backwards) keeps the entry.
        (now - entry.created_at)
            .to_std()
            .map(|age| age < self.ttl)
            .unwrap_or(true)
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        entries
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.value.clone())
    }

    pub async fn insert(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Returns the cached value or runs `load` and caches its result.
    /// Errors are not cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: K, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key).await {
            return Ok(value);
        }

        let value = load().await?;
        self.insert(key, value.clone()).await;

        Ok(value)
    }

    /// Drops expired entries and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry, now));

        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeDelta, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let clock = clock();
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(60), clock.clone());

        cache.insert("version", 1).await;
        assert_eq!(cache.get(&"version").await, Some(1));

        clock.advance(TimeDelta::seconds(59));
        assert_eq!(cache.get(&"version").await, Some(1));

        clock.advance(TimeDelta::seconds(1));
        assert_eq!(cache.get(&"version").await, None);
        assert_eq!(cache.purge_expired().await, 1);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn loader_runs_once_while_fresh() {
        let clock = clock();
        let cache: TtlCache<String, String> =
            TtlCache::new(Duration::from_secs(3600), clock.clone());
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with("k".to_string(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>("v".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "v");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(TimeDelta::hours(2));
        cache
            .get_or_try_insert_with("k".to_string(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>("v2".to_string())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn loader_errors_are_not_cached() {
        let cache: TtlCache<u8, u8> = TtlCache::new(Duration::from_secs(60), clock());

        let res = cache
            .get_or_try_insert_with(1, || async { Err::<u8, _>("down") })
            .await;
        assert_eq!(res, Err("down"));
        assert_eq!(cache.len().await, 0);
    }
}
