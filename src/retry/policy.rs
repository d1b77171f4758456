use log::warn;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::context::CallContext;
use crate::errors::Result;

/// Re-runs operations failing with [`ThothError::Timeout`].
///
/// Attempt `n + 1` starts `backoff * n` after attempt `n` failed, with a
/// context marked as a timeout retry. Other errors, and the cancellation of
/// the context, end the run.
///
/// [`ThothError::Timeout`]: crate::errors::ThothError::Timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(RetryConfig::default())
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.max_attempts, config.backoff())
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt; zero is treated as one.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Runs `operation` until it does not time out, or attempts run out.
    pub async fn run<T, F, Fut>(&self, ctx: &CallContext, mut operation: F) -> Result<T>
    where
        F: FnMut(CallContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = ctx.clone();
        loop {
            let err = match operation(attempt.clone()).await {
                Err(err) if err.is_timeout() && attempt.attempt() < self.max_attempts => err,
                other => return other,
            };

            let delay = self.backoff * attempt.attempt();
            warn!(
                "Attempt {} of {} timed out, retrying in {:?}: {}",
                attempt.attempt(),
                self.max_attempts,
                delay,
                err
            );
            tokio::select! {
                biased;
                cancelled = attempt.done() => return Err(cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt = attempt.with_timeout_retry();
        }
    }
}
