//! Mock slskd backend for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::slskd::{
    DownloadRequest, PeerResponse, PeerTransfer, SearchSession, SlskdApi, SlskdError,
};

/// A recorded enqueue call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEnqueue {
    pub username: String,
    pub files: Vec<DownloadRequest>,
}

#[derive(Debug, Default)]
struct Failures {
    search_start: Option<u16>,
    enqueue: Option<u16>,
    list_downloads: bool,
    delete_search: bool,
    ping: bool,
}

/// Mock implementation of the SlskdApi trait.
///
/// Provides controllable behavior for testing:
/// - Record started searches, enqueues and cancellations
/// - Script search responses and live transfers
/// - Simulate upstream failures per operation
///
/// # Example
///
/// ```rust,ignore
/// let slskd = MockSlskd::new();
/// slskd.set_responses(vec![fixtures::flac_album_response("alice", "Artist", "Album", 10)]).await;
///
/// // ... run a search through the service ...
///
/// assert_eq!(slskd.started_searches().await, vec!["artist album"]);
/// ```
#[derive(Debug)]
pub struct MockSlskd {
    /// (id, text) of every started search.
    searches: Arc<RwLock<Vec<(String, String)>>>,
    polls: Arc<RwLock<HashMap<String, u32>>>,
    polls_until_complete: AtomicU32,
    responses: Arc<RwLock<Vec<PeerResponse>>>,
    deleted: Arc<RwLock<Vec<String>>>,
    enqueued: Arc<RwLock<Vec<RecordedEnqueue>>>,
    transfers: Arc<RwLock<Vec<PeerTransfer>>>,
    cancelled: Arc<RwLock<Vec<(String, String)>>>,
    failures: Arc<RwLock<Failures>>,
    pings: AtomicU32,
}

impl Default for MockSlskd {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSlskd {
    /// Searches complete on the first poll and return no responses.
    pub fn new() -> Self {
        Self {
            searches: Arc::new(RwLock::new(Vec::new())),
            polls: Arc::new(RwLock::new(HashMap::new())),
            polls_until_complete: AtomicU32::new(1),
            responses: Arc::new(RwLock::new(Vec::new())),
            deleted: Arc::new(RwLock::new(Vec::new())),
            enqueued: Arc::new(RwLock::new(Vec::new())),
            transfers: Arc::new(RwLock::new(Vec::new())),
            cancelled: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(Failures::default())),
            pings: AtomicU32::new(0),
        }
    }

    /// Number of polls before a search reports completion.
    pub async fn set_polls_until_complete(&self, polls: u32) {
        self.polls_until_complete.store(polls, Ordering::SeqCst);
    }

    /// Responses returned for every search.
    pub async fn set_responses(&self, responses: Vec<PeerResponse>) {
        *self.responses.write().await = responses;
    }

    /// Live transfers returned by `list_downloads`.
    pub async fn set_transfers(&self, transfers: Vec<PeerTransfer>) {
        *self.transfers.write().await = transfers;
    }

    /// Texts of every started search, in order.
    pub async fn started_searches(&self) -> Vec<String> {
        self.searches
            .read()
            .await
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub async fn deleted_searches(&self) -> Vec<String> {
        self.deleted.read().await.clone()
    }

    pub async fn enqueued(&self) -> Vec<RecordedEnqueue> {
        self.enqueued.read().await.clone()
    }

    /// (username, transfer id) of every cancellation.
    pub async fn cancelled(&self) -> Vec<(String, String)> {
        self.cancelled.read().await.clone()
    }

    pub fn ping_count(&self) -> u32 {
        self.pings.load(Ordering::SeqCst)
    }

    /// Fail search starts with this HTTP status, or stop failing with `None`.
    pub async fn fail_search_start(&self, status: Option<u16>) {
        self.failures.write().await.search_start = status;
    }

    pub async fn fail_enqueue(&self, status: Option<u16>) {
        self.failures.write().await.enqueue = status;
    }

    pub async fn fail_list_downloads(&self, fail: bool) {
        self.failures.write().await.list_downloads = fail;
    }

    pub async fn fail_delete(&self, fail: bool) {
        self.failures.write().await.delete_search = fail;
    }

    pub async fn fail_ping(&self, fail: bool) {
        self.failures.write().await.ping = fail;
    }
}

fn http_error(status: u16) -> SlskdError {
    SlskdError::Http {
        status,
        body: "mock failure".to_string(),
    }
}

#[async_trait]
impl SlskdApi for MockSlskd {
    async fn start_search(&self, id: &str, text: &str) -> Result<SearchSession, SlskdError> {
        if let Some(status) = self.failures.read().await.search_start {
            return Err(http_error(status));
        }
        self.searches
            .write()
            .await
            .push((id.to_string(), text.to_string()));

        Ok(SearchSession {
            id: id.to_string(),
            search_text: text.to_string(),
            is_complete: false,
            response_count: 0,
            file_count: 0,
        })
    }

    async fn search_state(&self, id: &str) -> Result<SearchSession, SlskdError> {
        let text = self
            .searches
            .read()
            .await
            .iter()
            .find(|(search_id, _)| search_id == id)
            .map(|(_, text)| text.clone())
            .ok_or_else(|| http_error(404))?;

        let polls = {
            let mut polls = self.polls.write().await;
            let count = polls.entry(id.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let responses = self.responses.read().await;
        Ok(SearchSession {
            id: id.to_string(),
            search_text: text,
            is_complete: polls >= self.polls_until_complete.load(Ordering::SeqCst),
            response_count: responses.len() as u32,
            file_count: responses.iter().map(|r| r.files.len() as u32).sum(),
        })
    }

    async fn search_responses(&self, _id: &str) -> Result<Vec<PeerResponse>, SlskdError> {
        Ok(self.responses.read().await.clone())
    }

    async fn delete_search(&self, id: &str) -> Result<(), SlskdError> {
        if self.failures.read().await.delete_search {
            return Err(http_error(500));
        }
        self.deleted.write().await.push(id.to_string());
        Ok(())
    }

    async fn enqueue_downloads(
        &self,
        username: &str,
        files: &[DownloadRequest],
    ) -> Result<(), SlskdError> {
        if let Some(status) = self.failures.read().await.enqueue {
            return Err(http_error(status));
        }
        self.enqueued.write().await.push(RecordedEnqueue {
            username: username.to_string(),
            files: files.to_vec(),
        });
        Ok(())
    }

    async fn list_downloads(&self) -> Result<Vec<PeerTransfer>, SlskdError> {
        if self.failures.read().await.list_downloads {
            return Err(SlskdError::ConnectionFailed("mock failure".to_string()));
        }
        Ok(self.transfers.read().await.clone())
    }

    async fn cancel_download(&self, username: &str, id: &str) -> Result<(), SlskdError> {
        self.cancelled
            .write()
            .await
            .push((username.to_string(), id.to_string()));
        self.transfers
            .write()
            .await
            .retain(|t| !(t.username == username && t.id == id));
        Ok(())
    }

    async fn ping(&self) -> Result<(), SlskdError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.failures.read().await.ping {
            return Err(SlskdError::ConnectionFailed("mock failure".to_string()));
        }
        Ok(())
    }
}
