//! Retry with exponential backoff for transient upstream failures.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

use crate::metrics::UPSTREAM_RETRIES;

/// Classifies an error as worth retrying.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry schedule: up to `max_retries` extra attempts, waiting
/// `base_delay * 2^attempt` before each one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Deterministic schedule (no jitter) starting at `base_delay`.
    fn schedule(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: Duration::from_secs(300),
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Run `operation`, retrying while it fails with a retryable error.
///
/// Non-retryable errors, and the last error once retries are exhausted,
/// are returned unchanged.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, name: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut schedule = policy.schedule();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = schedule
                    .next_backoff()
                    .unwrap_or(policy.base_delay * 2u32.saturating_pow(attempt));
                attempt += 1;
                warn!(
                    operation = name,
                    attempt,
                    max_retries = policy.max_retries,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Upstream call failed, retrying"
                );
                UPSTREAM_RETRIES.with_label_values(&[name]).inc();
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
