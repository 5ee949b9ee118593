//! Resilience primitives for talking to an unreliable, stateful upstream.
//!
//! - [`KeyedLock`] serializes async operations that share a key.
//! - [`retry`] re-runs transiently failing operations with exponential backoff.
//! - [`ResilientCaller`] bounds every attempt with a timeout and retries.

mod call;
mod lock;
mod retry;

pub use call::{ResilientCaller, TimedOut};
pub use lock::KeyedLock;
pub use retry::{retry, RetryPolicy, Retryable};
