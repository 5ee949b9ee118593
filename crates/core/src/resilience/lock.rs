//! Per-key async mutex.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Serializes operations that share a string key.
///
/// Callers of [`KeyedLock::acquire`] with the same key run one at a time in
/// arrival order (tokio's mutex is fair); different keys never block each
/// other. A slot is dropped from the map once nobody holds or waits on it.
#[derive(Debug, Default)]
pub struct KeyedLock {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` while holding `key`.
    ///
    /// The key is released when the operation's future completes, whatever
    /// its output, before the next waiter is woken.
    pub async fn acquire<F, Fut, T>(&self, key: &str, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(key.to_string()).or_default())
        };

        let output = {
            let _guard = slot.lock().await;
            operation().await
        };

        self.release(key, slot).await;
        output
    }

    /// Number of keys currently held or awaited.
    pub async fn active_keys(&self) -> usize {
        self.slots.lock().await.len()
    }

    async fn release(&self, key: &str, slot: Arc<Mutex<()>>) {
        let mut slots = self.slots.lock().await;
        // Only the map and this handle remain: no holder, no waiter.
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_same_key_runs_sequentially() {
        let lock = Arc::new(KeyedLock::new());
        let events = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let lock = Arc::clone(&lock);
            let events = Arc::clone(&events);
            tokio::spawn(async move {
                lock.acquire("search", || async {
                    events.lock().await.push("first:start");
                    sleep(Duration::from_millis(100)).await;
                    events.lock().await.push("first:end");
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        let second = {
            let lock = Arc::clone(&lock);
            let events = Arc::clone(&events);
            tokio::spawn(async move {
                lock.acquire("search", || async {
                    events.lock().await.push("second:start");
                    events.lock().await.push("second:end");
                })
                .await
            })
        };

        first.await.unwrap();
        second.await.unwrap();

        assert_eq!(
            *events.lock().await,
            vec!["first:start", "first:end", "second:start", "second:end"]
        );
        assert_eq!(lock.active_keys().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_overlap() {
        let lock = Arc::new(KeyedLock::new());
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for key in ["job-a", "job-b"] {
            let lock = Arc::clone(&lock);
            let running = Arc::clone(&running);
            let max_running = Arc::clone(&max_running);
            handles.push(tokio::spawn(async move {
                lock.acquire(key, || async {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    max_running.fetch_max(now, Ordering::SeqCst);
                    sleep(Duration::from_millis(50)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_running.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_releases_lock() {
        let lock = Arc::new(KeyedLock::new());

        let failed: Result<(), String> = lock
            .acquire("job-1", || async { Err("upstream exploded".to_string()) })
            .await;
        assert!(failed.is_err());

        let next = tokio::time::timeout(
            Duration::from_secs(1),
            lock.acquire("job-1", || async { 42 }),
        )
        .await
        .expect("lock was not released after an error");
        assert_eq!(next, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_run_in_arrival_order() {
        let lock = Arc::new(KeyedLock::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                lock.acquire("k", || async {
                    sleep(Duration::from_millis(10)).await;
                    order.lock().await.push(i);
                })
                .await
            }));
            // Let each task reach the lock before spawning the next one.
            tokio::task::yield_now().await;
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }
}
