//! Drives one search on the peer network from start to cleanup.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SearchConfig;
use crate::metrics::SEARCHES;
use crate::resilience::KeyedLock;
use crate::slskd::{PeerResponse, SearchSession, SlskdApi, SlskdError};

use super::types::SearchWait;

/// slskd exposes one logical search slot, so starts are serialized on this key.
const START_LOCK_KEY: &str = "search";

pub struct SearchCoordinator {
    slskd: Arc<dyn SlskdApi>,
    lock: Arc<KeyedLock>,
    poll_interval: Duration,
    deadline: Duration,
}

impl SearchCoordinator {
    pub fn new(
        slskd: Arc<dyn SlskdApi>,
        lock: Arc<KeyedLock>,
        poll_interval: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            slskd,
            lock,
            poll_interval,
            deadline,
        }
    }

    pub fn from_config(slskd: Arc<dyn SlskdApi>, lock: Arc<KeyedLock>, config: &SearchConfig) -> Self {
        Self::new(
            slskd,
            lock,
            Duration::from_millis(config.poll_interval_ms),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Start a search under the global start lock.
    pub async fn start_search(&self, text: &str) -> Result<SearchSession, SlskdError> {
        let id = Uuid::new_v4().to_string();
        self.lock
            .acquire(START_LOCK_KEY, || self.slskd.start_search(&id, text))
            .await
    }

    /// Poll until the search completes or the deadline passes.
    ///
    /// Hitting the deadline is not an error: the caller proceeds with
    /// whatever responses exist.
    pub async fn wait_for_search(&self, id: &str) -> Result<SearchWait, SlskdError> {
        let deadline = Instant::now() + self.deadline;

        loop {
            let session = self.slskd.search_state(id).await?;
            if session.is_complete {
                return Ok(SearchWait {
                    completed: true,
                    file_count: session.file_count,
                });
            }

            if Instant::now() >= deadline {
                warn!(
                    search_id = id,
                    file_count = session.file_count,
                    deadline_secs = self.deadline.as_secs(),
                    "Search did not complete before deadline, using partial results"
                );
                return Ok(SearchWait {
                    completed: false,
                    file_count: session.file_count,
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    pub async fn get_search_responses(&self, id: &str) -> Result<Vec<PeerResponse>, SlskdError> {
        self.slskd.search_responses(id).await
    }

    /// Delete the search in a detached task. Failures are only logged.
    pub fn delete_search(&self, id: &str) {
        let slskd = Arc::clone(&self.slskd);
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = slskd.delete_search(&id).await {
                warn!(search_id = %id, error = %e, "Failed to delete search");
            }
        });
    }

    /// Start, wait, fetch responses, then clean up.
    pub async fn run(&self, text: &str) -> Result<Vec<PeerResponse>, SlskdError> {
        let session = match self.start_search(text).await {
            Ok(session) => session,
            Err(e) => {
                SEARCHES.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };
        debug!(search_id = %session.id, query = text, "Search started");

        let result = self.collect(&session.id).await;
        self.delete_search(&session.id);

        match &result {
            Ok((wait, responses)) => {
                let outcome = if wait.completed { "completed" } else { "timed_out" };
                SEARCHES.with_label_values(&[outcome]).inc();
                info!(
                    query = text,
                    completed = wait.completed,
                    responses = responses.len(),
                    "Search finished"
                );
            }
            Err(_) => SEARCHES.with_label_values(&["failed"]).inc(),
        }

        result.map(|(_, responses)| responses)
    }

    async fn collect(&self, id: &str) -> Result<(SearchWait, Vec<PeerResponse>), SlskdError> {
        let wait = self.wait_for_search(id).await?;
        let responses = self.get_search_responses(id).await?;
        Ok((wait, responses))
    }
}
