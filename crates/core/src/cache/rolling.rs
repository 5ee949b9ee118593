use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::ttl::CacheEntry;

/// TTL cache that refreshes entries before they expire.
///
/// While an entry is live it is returned immediately. Once its remaining
/// lifetime drops inside `refresh_window`, the loader is spawned in the
/// background (at most one refresh per key at a time) and the stale value is
/// still returned. A failed background refresh is logged and the old value
/// keeps serving until it expires; after that the next caller loads in the
/// foreground and sees the loader's error.
#[derive(Debug)]
pub struct RollingCache<K, V> {
    entries: Arc<RwLock<HashMap<K, CacheEntry<V>>>>,
    refreshing: Arc<Mutex<HashSet<K>>>,
    ttl: Duration,
    refresh_window: Duration,
}

impl<K, V> RollingCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, refresh_window: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            refreshing: Arc::new(Mutex::new(HashSet::new())),
            ttl,
            refresh_window: refresh_window.min(ttl),
        }
    }

    pub async fn get_or_load<F, Fut, E>(&self, key: K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let cached = {
            let entries = self.entries.read().await;
            entries
                .get(&key)
                .filter(|entry| !entry.is_expired())
                .map(|entry| (entry.value.clone(), entry.remaining()))
        };

        match cached {
            Some((value, remaining)) => {
                if remaining <= self.refresh_window {
                    self.spawn_refresh(key, loader).await;
                }
                Ok(value)
            }
            None => {
                let value = loader().await?;
                self.entries
                    .write()
                    .await
                    .insert(key, CacheEntry::new(value.clone(), self.ttl));
                Ok(value)
            }
        }
    }

    pub async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    async fn spawn_refresh<F, Fut, E>(&self, key: K, loader: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if !self.refreshing.lock().await.insert(key.clone()) {
            return;
        }

        let entries = Arc::clone(&self.entries);
        let refreshing = Arc::clone(&self.refreshing);
        let ttl = self.ttl;

        tokio::spawn(async move {
            match loader().await {
                Ok(value) => {
                    debug!(key = ?key, "Background refresh succeeded");
                    entries
                        .write()
                        .await
                        .insert(key.clone(), CacheEntry::new(value, ttl));
                }
                Err(e) => {
                    warn!(key = ?key, error = %e, "Background refresh failed, serving stale value");
                }
            }
            refreshing.lock().await.remove(&key);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::advance;

    fn counting_loader(
        calls: Arc<AtomicU32>,
        fail: bool,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, String>> + Send>> {
        move || {
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if fail {
                    Err("slskd unreachable".to_string())
                } else {
                    Ok(n)
                }
            })
        }
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_loads_in_foreground() {
        let cache = RollingCache::new(Duration::from_secs(60), Duration::from_secs(10));
        let calls = Arc::new(AtomicU32::new(0));

        let value = cache
            .get_or_load("state", counting_loader(Arc::clone(&calls), false))
            .await
            .unwrap();
        assert_eq!(value, 1);

        let value = cache
            .get_or_load("state", counting_loader(Arc::clone(&calls), false))
            .await
            .unwrap();
        assert_eq!(value, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_window_serves_stale_then_updates() {
        let cache = RollingCache::new(Duration::from_secs(60), Duration::from_secs(10));
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .get_or_load("state", counting_loader(Arc::clone(&calls), false))
            .await
            .unwrap();

        advance(Duration::from_secs(55)).await;
        let stale = cache
            .get_or_load("state", counting_loader(Arc::clone(&calls), false))
            .await
            .unwrap();
        assert_eq!(stale, 1);

        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let fresh = cache
            .get_or_load("state", counting_loader(Arc::clone(&calls), false))
            .await
            .unwrap();
        assert_eq!(fresh, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_stale_value() {
        let cache = RollingCache::new(Duration::from_secs(60), Duration::from_secs(10));
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .get_or_load("state", counting_loader(Arc::clone(&calls), false))
            .await
            .unwrap();

        advance(Duration::from_secs(55)).await;
        let value = cache
            .get_or_load("state", counting_loader(Arc::clone(&calls), true))
            .await
            .unwrap();
        assert_eq!(value, 1);
        settle().await;

        let value = cache
            .get_or_load("state", counting_loader(Arc::clone(&calls), true))
            .await;
        assert_eq!(value, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_reloads_and_propagates_error() {
        let cache: RollingCache<&str, u32> =
            RollingCache::new(Duration::from_secs(60), Duration::from_secs(10));
        let calls = Arc::new(AtomicU32::new(0));

        cache
            .get_or_load("state", counting_loader(Arc::clone(&calls), false))
            .await
            .unwrap();
        advance(Duration::from_secs(61)).await;

        let result = cache
            .get_or_load("state", counting_loader(Arc::clone(&calls), true))
            .await;
        assert_eq!(result, Err("slskd unreachable".to_string()));
    }
}
