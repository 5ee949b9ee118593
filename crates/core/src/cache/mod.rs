//! In-memory TTL caches.
//!
//! [`TtlCache`] holds search results and per-release metadata between the
//! Torznab search and the NZB download; [`RollingCache`] serves slow-moving
//! upstream state while refreshing it in the background.

mod rolling;
mod ttl;

pub use rolling::RollingCache;
pub use ttl::{CacheEntry, TtlCache};
