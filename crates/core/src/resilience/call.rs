//! Timeout + retry wrapper applied to every upstream call.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use super::retry::{retry, RetryPolicy, Retryable};

/// Builds the error reported when an attempt exceeds its deadline.
pub trait TimedOut {
    fn timed_out(after: Duration) -> Self;
}

/// Applies a per-attempt timeout and, optionally, a retry policy.
///
/// An attempt that exceeds the timeout is dropped, which cancels the
/// in-flight request, and surfaces as `E::timed_out`.
#[derive(Debug, Clone)]
pub struct ResilientCaller {
    timeout: Duration,
    retry: Option<RetryPolicy>,
}

impl Default for ResilientCaller {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), Some(RetryPolicy::default()))
    }
}

impl ResilientCaller {
    pub fn new(timeout: Duration, retry: Option<RetryPolicy>) -> Self {
        Self { timeout, retry }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    pub async fn call<T, E, F, Fut>(&self, name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + TimedOut + Display,
    {
        let timeout = self.timeout;
        let attempt = || {
            let fut = operation();
            async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(E::timed_out(timeout)),
                }
            }
        };

        match &self.retry {
            Some(policy) => retry(policy, name, attempt).await,
            None => {
                let mut attempt = attempt;
                attempt().await
            }
        }
    }
}
