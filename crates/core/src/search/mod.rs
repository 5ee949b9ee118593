//! Search pipeline: coordinate a peer-network search, group the responses
//! into releases and cache them for Torznab reads and NZB downloads.

mod coordinator;
mod grouper;
mod service;
mod title;
mod types;

pub use coordinator::SearchCoordinator;
pub use grouper::{classify, group_responses, is_audio_file, last_segment, parent_directory};
pub use service::{normalize_query, SearchService};
pub use title::{directory_title, job_title, release_title};
pub use types::*;
