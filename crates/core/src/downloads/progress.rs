//! Correlates live slskd transfers with tracked jobs.

use crate::slskd::PeerTransfer;

use super::status::{aggregate_status, map_transfer_state, DownloadStatus};
use super::tracker::TrackedDownload;

const MIB: f64 = 1024.0 * 1024.0;

/// Shown when transfers are running but report no speed.
pub const TIME_LEFT_UNKNOWN: &str = "99:99:99";
pub const TIME_LEFT_NONE: &str = "00:00:00";

/// A job's state derived from its transfers.
#[derive(Debug, Clone, PartialEq)]
pub struct JobProgress {
    pub status: DownloadStatus,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub time_left: String,
}

impl JobProgress {
    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.transferred_bytes)
    }

    pub fn mb(&self) -> f64 {
        self.total_bytes as f64 / MIB
    }

    pub fn mb_left(&self) -> f64 {
        self.remaining_bytes() as f64 / MIB
    }

    /// Whole percent complete, 0..=100.
    pub fn percentage(&self) -> u32 {
        if self.total_bytes == 0 {
            return 0;
        }
        ((self.transferred_bytes.min(self.total_bytes) * 100) / self.total_bytes) as u32
    }
}

/// Transfers belonging to `job`: same peer, filename in the job's list.
pub fn matching_transfers<'a>(
    job: &TrackedDownload,
    transfers: &'a [PeerTransfer],
) -> Vec<&'a PeerTransfer> {
    transfers
        .iter()
        .filter(|t| t.username == job.username && job.has_file(&t.filename))
        .collect()
}

pub fn job_progress(job: &TrackedDownload, transfers: &[PeerTransfer]) -> JobProgress {
    let matched = matching_transfers(job, transfers);
    let status = aggregate_status(matched.iter().map(|t| t.state.as_str()));
    let transferred_bytes = matched.iter().map(|t| t.bytes_transferred).sum();

    let downloading: Vec<&&PeerTransfer> = matched
        .iter()
        .filter(|t| map_transfer_state(&t.state) == DownloadStatus::Downloading)
        .collect();

    let progress = JobProgress {
        status,
        total_bytes: job.total_size,
        transferred_bytes,
        time_left: String::new(),
    };

    let time_left = if downloading.is_empty() {
        TIME_LEFT_NONE.to_string()
    } else {
        let speed: f64 = downloading.iter().map(|t| t.average_speed).sum();
        if speed <= 0.0 {
            TIME_LEFT_UNKNOWN.to_string()
        } else {
            format_time_left((progress.remaining_bytes() as f64 / speed).ceil() as u64)
        }
    };

    JobProgress {
        time_left,
        ..progress
    }
}

/// `HH:MM:SS`, hours uncapped.
pub fn format_time_left(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
