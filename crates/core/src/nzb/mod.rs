//! Synthetic NZB documents carrying slskd download metadata.
//!
//! Lidarr hands the NZB it fetched from the Torznab feed back to the
//! SABnzbd API untouched, which makes the document the only channel from
//! search to enqueue. The peer username and file list travel as base64 JSON
//! in a `<meta type="slskd">` head tag:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!DOCTYPE nzb PUBLIC "-//newzBin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd">
//! <nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
//!   <head>
//!     <meta type="title">Artist - Album</meta>
//!     <meta type="slskd">eyJ1c2VybmFtZSI6...</meta>
//!   </head>
//!   <file poster="soulbridge" date="1700000000" subject="Artist - Album">
//!     <groups><group>alt.binaries.sounds</group></groups>
//!     <segments><segment bytes="123456" number="1">soulbridge@localhost</segment></segments>
//!   </file>
//! </nzb>
//! ```
//!
//! The `<file>` block only exists so generic NZB parsers accept the
//! document; nothing ever fetches it.

mod codec;

pub use codec::{decode_nzb, encode_nzb};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::slskd::DownloadRequest;

/// Payload embedded in the NZB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NzbMetadata {
    pub username: String,
    pub files: Vec<DownloadRequest>,
}

impl NzbMetadata {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[derive(Debug, Error)]
pub enum NzbError {
    #[error("NZB has no slskd metadata")]
    MissingMetadata,

    #[error("Invalid slskd metadata: {0}")]
    InvalidMetadata(String),

    #[error("Failed to write NZB: {0}")]
    Xml(String),
}
