//! slskd (Soulseek daemon) abstraction.
//!
//! This module provides the `SlskdApi` trait covering the subset of the
//! slskd REST API the bridge uses: searches and download transfers.

mod client;
mod types;

pub use client::SlskdClient;
pub use types::*;
