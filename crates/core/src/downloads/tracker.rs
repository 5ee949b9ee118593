//! In-memory registry of download jobs submitted through the SABnzbd API.
//!
//! Jobs live for the process lifetime only. After a restart Lidarr may ask
//! about ids the tracker no longer knows; callers treat those as absent.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::slskd::DownloadRequest;

/// One download job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDownload {
    pub nzo_id: String,
    pub title: String,
    pub category: String,
    pub username: String,
    pub files: Vec<DownloadRequest>,
    pub total_size: u64,
    pub added_at: DateTime<Utc>,
}

impl TrackedDownload {
    /// New job with a fresh SABnzbd-style id.
    pub fn new(title: String, category: String, username: String, files: Vec<DownloadRequest>) -> Self {
        let total_size = files.iter().map(|f| f.size).sum();
        Self {
            nzo_id: new_job_id(),
            title,
            category,
            username,
            files,
            total_size,
            added_at: Utc::now(),
        }
    }

    pub fn has_file(&self, filename: &str) -> bool {
        self.files.iter().any(|f| f.filename == filename)
    }
}

pub fn new_job_id() -> String {
    format!("SABnzbd_nzo_{}", Uuid::new_v4().simple())
}

#[derive(Debug, Default)]
pub struct DownloadTracker {
    jobs: RwLock<HashMap<String, TrackedDownload>>,
}

impl DownloadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, job: TrackedDownload) {
        self.jobs.write().await.insert(job.nzo_id.clone(), job);
    }

    pub async fn get(&self, nzo_id: &str) -> Option<TrackedDownload> {
        self.jobs.read().await.get(nzo_id).cloned()
    }

    /// All jobs, oldest first.
    pub async fn list(&self) -> Vec<TrackedDownload> {
        let mut jobs: Vec<TrackedDownload> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.nzo_id.cmp(&b.nzo_id)));
        jobs
    }

    pub async fn remove(&self, nzo_id: &str) -> Option<TrackedDownload> {
        self.jobs.write().await.remove(nzo_id)
    }

    pub async fn clear(&self) {
        self.jobs.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(title: &str) -> TrackedDownload {
        TrackedDownload::new(
            title.to_string(),
            "music".to_string(),
            "u1".to_string(),
            vec![
                DownloadRequest {
                    filename: "Music\\Album\\01.flac".to_string(),
                    size: 3,
                },
                DownloadRequest {
                    filename: "Music\\Album\\02.flac".to_string(),
                    size: 4,
                },
            ],
        )
    }

    #[test]
    fn test_new_job() {
        let job = job("Album");
        assert!(job.nzo_id.starts_with("SABnzbd_nzo_"));
        assert_eq!(job.nzo_id.len(), "SABnzbd_nzo_".len() + 32);
        assert_eq!(job.total_size, 7);
        assert!(job.has_file("Music\\Album\\02.flac"));
        assert!(!job.has_file("02.flac"));
    }

    #[test]
    fn test_tracker_from_sync_context() {
        let tracker = DownloadTracker::new();
        let id = tokio_test::block_on(async {
            let job = job("Album");
            let id = job.nzo_id.clone();
            tracker.add(job).await;
            id
        });
        assert_eq!(tokio_test::block_on(tracker.len()), 1);
        assert!(tokio_test::block_on(tracker.get(&id)).is_some());
    }

    #[tokio::test]
    async fn test_add_get_remove() {
        let tracker = DownloadTracker::new();
        let job = job("Album");
        let id = job.nzo_id.clone();

        tracker.add(job.clone()).await;
        assert_eq!(tracker.get(&id).await, Some(job));
        assert_eq!(tracker.len().await, 1);

        assert!(tracker.remove(&id).await.is_some());
        assert!(tracker.get(&id).await.is_none());
        assert!(tracker.remove(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_list_and_clear() {
        let tracker = DownloadTracker::new();
        tracker.add(job("A")).await;
        tracker.add(job("B")).await;

        assert_eq!(tracker.list().await.len(), 2);
        tracker.clear().await;
        assert!(tracker.is_empty().await);
    }
}
