//! Testing utilities and mock implementations.
//!
//! `MockSlskd` stands in for the slskd daemon so the search pipeline and
//! both HTTP gateways can be exercised without a Soulseek connection.
//!
//! # Example
//!
//! ```rust,ignore
//! use soulbridge_core::testing::{fixtures, MockSlskd};
//!
//! let slskd = MockSlskd::new();
//! slskd.set_responses(vec![fixtures::flac_album_response("alice", "Artist", "Album", 10)]).await;
//! slskd.set_transfers(vec![fixtures::transfer("alice", "Music\\Artist\\Album\\01 - Track 1.flac", "InProgress", 100, 50)]).await;
//! ```

mod mock_slskd;

pub use mock_slskd::{MockSlskd, RecordedEnqueue};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::slskd::{PeerFile, PeerResponse, PeerTransfer};

    /// Remote path of track `n` in a fixture album.
    pub fn track_path(artist: &str, album: &str, n: usize, ext: &str) -> String {
        format!("Music\\{}\\{}\\{:02} - Track {}.{}", artist, album, n, n, ext)
    }

    /// A peer sharing a FLAC album plus its cover art.
    pub fn flac_album_response(
        username: &str,
        artist: &str,
        album: &str,
        tracks: usize,
    ) -> PeerResponse {
        let mut files: Vec<PeerFile> = (1..=tracks)
            .map(|n| PeerFile {
                filename: track_path(artist, album, n, "flac"),
                size: 30_000_000,
                bit_rate: None,
                bit_depth: Some(16),
                sample_rate: Some(44_100),
            })
            .collect();
        files.push(PeerFile {
            filename: format!("Music\\{}\\{}\\cover.jpg", artist, album),
            size: 200_000,
            bit_rate: None,
            bit_depth: None,
            sample_rate: None,
        });

        PeerResponse {
            username: username.to_string(),
            has_free_upload_slot: true,
            upload_speed: 1_000_000,
            files,
        }
    }

    /// A peer sharing an MP3 album at one bit rate.
    pub fn mp3_album_response(
        username: &str,
        artist: &str,
        album: &str,
        tracks: usize,
        bit_rate: u32,
    ) -> PeerResponse {
        PeerResponse {
            username: username.to_string(),
            has_free_upload_slot: false,
            upload_speed: 250_000,
            files: (1..=tracks)
                .map(|n| PeerFile {
                    filename: track_path(artist, album, n, "mp3"),
                    size: 8_000_000,
                    bit_rate: Some(bit_rate),
                    bit_depth: None,
                    sample_rate: None,
                })
                .collect(),
        }
    }

    pub fn transfer(
        username: &str,
        filename: &str,
        state: &str,
        size: u64,
        bytes_transferred: u64,
    ) -> PeerTransfer {
        PeerTransfer {
            id: format!("{:x}", transfer_hash(username, filename)),
            username: username.to_string(),
            filename: filename.to_string(),
            size,
            state: state.to_string(),
            bytes_transferred,
            average_speed: if state == "InProgress" { 100_000.0 } else { 0.0 },
            percent_complete: if size == 0 {
                0.0
            } else {
                bytes_transferred as f64 * 100.0 / size as f64
            },
        }
    }

    fn transfer_hash(username: &str, filename: &str) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        (username, filename).hash(&mut hasher);
        hasher.finish()
    }
}
