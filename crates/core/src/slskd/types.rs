//! Types for the slskd API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::{Retryable, TimedOut};

/// Errors from slskd calls.
#[derive(Debug, Clone, Error)]
pub enum SlskdError {
    #[error("slskd connection failed: {0}")]
    ConnectionFailed(String),

    #[error("slskd request timed out after {0:?}")]
    Timeout(Duration),

    #[error("slskd returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to decode slskd response: {0}")]
    Decode(String),
}

impl SlskdError {
    /// Upstream HTTP status, if the daemon answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            SlskdError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Retryable for SlskdError {
    fn is_retryable(&self) -> bool {
        match self {
            SlskdError::ConnectionFailed(_) | SlskdError::Timeout(_) => true,
            SlskdError::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            SlskdError::Decode(_) => false,
        }
    }
}

impl TimedOut for SlskdError {
    fn timed_out(after: Duration) -> Self {
        SlskdError::Timeout(after)
    }
}

/// State of a search on the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSession {
    pub id: String,
    #[serde(default)]
    pub search_text: String,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub response_count: u32,
    #[serde(default)]
    pub file_count: u32,
}

/// A file offered by one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerFile {
    /// Full remote path, e.g. `@@share\Music\Artist\Album\01 - Track.flac`.
    pub filename: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

/// One peer's reply to a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerResponse {
    pub username: String,
    #[serde(default)]
    pub has_free_upload_slot: bool,
    #[serde(default)]
    pub upload_speed: u64,
    #[serde(default)]
    pub files: Vec<PeerFile>,
}

/// A file to enqueue for download from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub filename: String,
    pub size: u64,
}

/// Live status of one download transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerTransfer {
    pub id: String,
    pub username: String,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    /// Comma separated state flags, e.g. `"Completed, Succeeded"`.
    pub state: String,
    #[serde(default)]
    pub bytes_transferred: u64,
    #[serde(default)]
    pub average_speed: f64,
    #[serde(default)]
    pub percent_complete: f64,
}

/// Trait for the slskd backend.
#[async_trait]
pub trait SlskdApi: Send + Sync {
    /// Start a search with a caller-chosen id.
    async fn start_search(&self, id: &str, text: &str) -> Result<SearchSession, SlskdError>;

    /// Current state of a search.
    async fn search_state(&self, id: &str) -> Result<SearchSession, SlskdError>;

    /// All peer responses collected for a search.
    async fn search_responses(&self, id: &str) -> Result<Vec<PeerResponse>, SlskdError>;

    async fn delete_search(&self, id: &str) -> Result<(), SlskdError>;

    /// Enqueue files from one peer.
    async fn enqueue_downloads(
        &self,
        username: &str,
        files: &[DownloadRequest],
    ) -> Result<(), SlskdError>;

    /// Every download transfer the daemon knows about.
    async fn list_downloads(&self) -> Result<Vec<PeerTransfer>, SlskdError>;

    async fn cancel_download(&self, username: &str, id: &str) -> Result<(), SlskdError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), SlskdError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(SlskdError::ConnectionFailed("refused".into()).is_retryable());
        assert!(SlskdError::Timeout(Duration::from_secs(10)).is_retryable());
        for status in [429, 500, 502, 503, 504] {
            let err = SlskdError::Http {
                status,
                body: String::new(),
            };
            assert!(err.is_retryable(), "{} should be retryable", status);
        }
        for status in [400, 401, 404, 409, 501] {
            let err = SlskdError::Http {
                status,
                body: String::new(),
            };
            assert!(!err.is_retryable(), "{} should be fatal", status);
        }
        assert!(!SlskdError::Decode("bad json".into()).is_retryable());
    }

    #[test]
    fn test_peer_response_deserialization() {
        let json = r#"{
            "username": "vinyl_hoarder",
            "hasFreeUploadSlot": true,
            "uploadSpeed": 1250000,
            "queueLength": 0,
            "files": [
                {"filename": "Music\\Boards of Canada\\Geogaddi\\01 Ready Lets Go.flac",
                 "size": 2048000, "bitDepth": 16, "sampleRate": 44100, "code": 1},
                {"filename": "Music\\Boards of Canada\\Geogaddi\\cover.jpg", "size": 1000}
            ]
        }"#;

        let response: PeerResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.username, "vinyl_hoarder");
        assert!(response.has_free_upload_slot);
        assert_eq!(response.upload_speed, 1_250_000);
        assert_eq!(response.files.len(), 2);
        assert_eq!(response.files[0].bit_depth, Some(16));
        assert_eq!(response.files[0].bit_rate, None);
    }

    #[test]
    fn test_search_session_deserialization() {
        let json = r#"{"id":"abc","searchText":"geogaddi","isComplete":false,
                       "responseCount":3,"fileCount":40,"state":"InProgress"}"#;
        let session: SearchSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.id, "abc");
        assert!(!session.is_complete);
        assert_eq!(session.file_count, 40);
    }
}
