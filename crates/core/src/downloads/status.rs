//! Maps slskd transfer states onto SABnzbd job statuses.

use serde::{Deserialize, Serialize};

/// SABnzbd-facing job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadStatus {
    Downloading,
    Queued,
    Paused,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Downloading => "Downloading",
            DownloadStatus::Queued => "Queued",
            DownloadStatus::Paused => "Paused",
            DownloadStatus::Completed => "Completed",
            DownloadStatus::Failed => "Failed",
        }
    }

    /// Finished jobs belong in history, everything else in the queue.
    pub fn is_finished(&self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Failed)
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const FAILURE_FLAGS: &[&str] = &["Cancelled", "TimedOut", "Errored", "Rejected"];

/// Map a comma separated slskd state such as `"Completed, Succeeded"`.
///
/// Unrecognized states map to `Queued`.
pub fn map_transfer_state(flags: &str) -> DownloadStatus {
    let flags: Vec<&str> = flags.split(',').map(str::trim).collect();
    let has = |flag: &str| flags.contains(&flag);

    if has("Completed") {
        if has("Succeeded") {
            return DownloadStatus::Completed;
        }
        if FAILURE_FLAGS.iter().any(|f| has(f)) {
            return DownloadStatus::Failed;
        }
        return DownloadStatus::Completed;
    }
    if has("InProgress") {
        return DownloadStatus::Downloading;
    }
    if has("Queued") || has("Initializing") {
        return DownloadStatus::Queued;
    }
    DownloadStatus::Queued
}

/// Status of a job from the states of its transfers.
///
/// Precedence: all completed, then any failed, then any downloading, then
/// any queued. No transfers at all reads as queued.
pub fn aggregate_status<'a, I>(states: I) -> DownloadStatus
where
    I: IntoIterator<Item = &'a str>,
{
    let statuses: Vec<DownloadStatus> = states.into_iter().map(map_transfer_state).collect();

    if statuses.is_empty() {
        return DownloadStatus::Queued;
    }
    if statuses.iter().all(|s| *s == DownloadStatus::Completed) {
        return DownloadStatus::Completed;
    }
    if statuses.contains(&DownloadStatus::Failed) {
        return DownloadStatus::Failed;
    }
    if statuses.contains(&DownloadStatus::Downloading) {
        return DownloadStatus::Downloading;
    }
    if statuses.contains(&DownloadStatus::Queued) {
        return DownloadStatus::Queued;
    }
    DownloadStatus::Completed
}
