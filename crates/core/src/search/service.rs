//! Cache-checked search pipeline behind the Torznab gateway.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::TtlCache;
use crate::config::SearchConfig;
use crate::metrics::SEARCH_CACHE_LOOKUPS;
use crate::resilience::KeyedLock;
use crate::slskd::{SlskdApi, SlskdError};

use super::coordinator::SearchCoordinator;
use super::grouper::group_responses;
use super::types::GroupedResult;

/// Cache key for a query: trimmed and lower-cased.
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Runs searches, reusing grouped results for repeated queries and keeping
/// each result addressable by guid for the NZB download.
pub struct SearchService {
    coordinator: SearchCoordinator,
    lock: Arc<KeyedLock>,
    searches: TtlCache<String, Vec<GroupedResult>>,
    results: TtlCache<String, GroupedResult>,
}

impl SearchService {
    pub fn new(
        slskd: Arc<dyn SlskdApi>,
        lock: Arc<KeyedLock>,
        config: &SearchConfig,
    ) -> Self {
        Self {
            coordinator: SearchCoordinator::from_config(slskd, Arc::clone(&lock), config),
            lock,
            searches: TtlCache::new(Duration::from_secs(config.cache_ttl_secs)),
            results: TtlCache::new(Duration::from_secs(config.result_ttl_secs)),
        }
    }

    /// Grouped results for `query`, from cache or a fresh search.
    ///
    /// Identical concurrent queries are single-flighted: the second waits for
    /// the first and then reads its cached results.
    pub async fn search(&self, query: &str) -> Result<Vec<GroupedResult>, SlskdError> {
        let key = normalize_query(query);
        let lock_key = format!("search:{}", key);

        let results = self
            .lock
            .acquire(&lock_key, || async {
                if let Some(cached) = self.searches.get(&key).await {
                    SEARCH_CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
                    debug!(query = %key, results = cached.len(), "Search cache hit");
                    return Ok(cached);
                }
                SEARCH_CACHE_LOOKUPS.with_label_values(&["miss"]).inc();

                let responses = self.coordinator.run(query.trim()).await?;
                let grouped = group_responses(&responses);
                self.searches.set(key.clone(), grouped.clone()).await;
                Ok::<_, SlskdError>(grouped)
            })
            .await?;

        for result in &results {
            self.results.set(result.guid.clone(), result.clone()).await;
        }
        Ok(results)
    }

    /// A previously returned result, if it has not expired.
    pub async fn result(&self, guid: &str) -> Option<GroupedResult> {
        self.results.get(&guid.to_string()).await
    }

    /// Drop expired entries from both caches. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        self.searches.sweep().await + self.results.sweep().await
    }

    pub async fn cached_results(&self) -> usize {
        self.results.len().await
    }
}
