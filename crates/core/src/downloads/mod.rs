//! Download jobs: the tracker, status translation and progress reporting
//! behind the SABnzbd queue and history.

mod progress;
mod status;
mod tracker;

pub use progress::{
    format_time_left, job_progress, matching_transfers, JobProgress, TIME_LEFT_NONE,
    TIME_LEFT_UNKNOWN,
};
pub use status::{aggregate_status, map_transfer_state, DownloadStatus};
pub use tracker::{new_job_id, DownloadTracker, TrackedDownload};
