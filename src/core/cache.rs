use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

/// Independent TTLs for live quotes and daily series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub live: Duration,
    pub historical: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            live: Duration::from_secs(120),
            historical: Duration::from_secs(300),
        }
    }
}

type Slot<V> = Arc<Mutex<Option<CacheEntry<V>>>>;

/// In-memory cache whose entries expire after a per-call TTL.
///
/// Each key owns a slot guarded by its own async mutex. A computation runs
/// while holding that slot, so concurrent callers for the same key wait for
/// the first one instead of issuing duplicate upstream requests. Failed
/// computations are never stored.
pub struct Cache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, key: &K) -> Slot<V> {
        let mut slots = self.slots.lock().await;
        Arc::clone(
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        )
    }

    /// Returns the live value for `key`, or runs `compute` and stores its
    /// result for `ttl`. Errors from `compute` are returned and not cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, ttl: Duration, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot(&key).await;
        let mut entry = slot.lock().await;

        match &*entry {
            Some(cached) if cached.is_live() => {
                debug!("Cache HIT for key: {:?}", key);
                return Ok(cached.value.clone());
            }
            Some(_) => debug!("Cache entry expired for key: {:?}", key),
            None => debug!("Cache MISS for key: {:?}", key),
        }

        match compute().await {
            Ok(value) => {
                debug!("Cache PUT for key: {:?}", key);
                *entry = Some(CacheEntry {
                    value: value.clone(),
                    expires_at: Instant::now() + ttl,
                });
                Ok(value)
            }
            Err(e) => {
                *entry = None;
                Err(e)
            }
        }
    }

    /// Live value for `key` without computing anything.
    pub async fn get(&self, key: &K) -> Option<V> {
        let slot = self.slots.lock().await.get(key).cloned()?;
        let entry = slot.lock().await;
        match &*entry {
            Some(cached) if cached.is_live() => Some(cached.value.clone()),
            _ => None,
        }
    }

    /// Drops expired and empty slots. Slots held by a caller, including one
    /// that has not locked its slot yet, are kept.
    pub async fn purge_expired(&self) {
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(entry) => matches!(&*entry, Some(cached) if cached.is_live()),
                Err(_) => true,
            }
        });
        debug!("Cache PURGE removed {} entries", before - slots.len());
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_compute_once_within_ttl() {
        let cache = Cache::<String, i32>::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("key1".to_string(), TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(123)
                })
                .await;
            assert_eq!(value, Ok(123));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(&"key1".to_string()).await, Some(123));
        assert!(cache.get(&"key2".to_string()).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_recomputed() {
        let cache = Cache::<String, i32>::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_millis(10);

        let compute = || async {
            Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) as i32)
        };

        assert_eq!(cache.get_or_compute("key1".to_string(), ttl, compute).await, Ok(0));
        sleep(Duration::from_millis(20)).await;
        assert!(cache.get(&"key1".to_string()).await.is_none());
        assert_eq!(cache.get_or_compute("key1".to_string(), ttl, compute).await, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = Cache::<String, i32>::new();
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_compute("key1".to_string(), TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>("upstream down".to_string())
            })
            .await;
        assert_eq!(first, Err("upstream down".to_string()));
        assert!(cache.get(&"key1".to_string()).await.is_none());

        let second = cache
            .get_or_compute("key1".to_string(), TTL, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(7)
            })
            .await;
        assert_eq!(second, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = Arc::new(Cache::<String, i32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                tokio::spawn(async move {
                    cache
                        .get_or_compute("shared".to_string(), TTL, || async {
                            calls.fetch_add(1, Ordering::SeqCst);
                            sleep(Duration::from_millis(20)).await;
                            Ok::<_, String>(42)
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = Cache::<String, i32>::new();
        let short = Duration::from_millis(10);

        let _ = cache
            .get_or_compute("stale".to_string(), short, || async { Ok::<_, String>(1) })
            .await;
        let _ = cache
            .get_or_compute("fresh".to_string(), TTL, || async { Ok::<_, String>(2) })
            .await;
        assert_eq!(cache.len().await, 2);

        sleep(Duration::from_millis(20)).await;
        cache.purge_expired().await;

        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get(&"fresh".to_string()).await, Some(2));
    }

    #[tokio::test]
    async fn test_purge_keeps_slot_claimed_before_lock() {
        let cache = Cache::<String, i32>::new();
        let key = "pending".to_string();

        // a caller has claimed the slot but not locked it yet
        let claimed = cache.slot(&key).await;
        cache.purge_expired().await;
        assert_eq!(cache.len().await, 1);

        *claimed.lock().await = Some(CacheEntry {
            value: 5,
            expires_at: Instant::now() + TTL,
        });
        drop(claimed);

        let value = cache
            .get_or_compute(key.clone(), TTL, || async { Ok::<_, String>(6) })
            .await;
        assert_eq!(value, Ok(5));

        cache.purge_expired().await;
        assert_eq!(cache.get(&key).await, Some(5));
    }
}
