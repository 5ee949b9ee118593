//! Types for the search pipeline.

use serde::{Deserialize, Serialize};

use crate::slskd::PeerFile;

/// Newznab audio categories.
pub const CATEGORY_AUDIO: u32 = 3000;
pub const CATEGORY_MP3: u32 = 3010;
pub const CATEGORY_LOSSLESS: u32 = 3040;

/// One peer directory of audio files, exposed to Lidarr as a release.
///
/// Every file shares `username` and `directory`, and every file is audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedResult {
    pub guid: String,
    pub username: String,
    pub directory: String,
    pub files: Vec<PeerFile>,
    pub total_size: u64,
    pub has_free_upload_slot: bool,
    pub upload_speed: u64,
    /// Rounded mean of reported bit rates, 0 when none report one.
    pub bit_rate: u32,
    pub category: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_tag: Option<String>,
}

/// Outcome of waiting on a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWait {
    /// False when the deadline passed first.
    pub completed: bool,
    pub file_count: u32,
}
