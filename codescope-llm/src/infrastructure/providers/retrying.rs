//! Retry wrapper for reviewers
//!
//! Retries retryable failures with exponential backoff, honouring a
//! provider's `retry-after` hint when it fits under the backoff ceiling.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, warn};

use codescope_core::config::RetryConfigSerializable;

use crate::domain::{ModelReviewer, ReviewerError};

/// Backoff policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfigSerializable::default())
    }
}

impl From<&RetryConfigSerializable> for RetryPolicy {
    fn from(config: &RetryConfigSerializable) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// Grow `current` by the multiplier, capped at `max_delay`.
    ///
    /// A product that is not a valid duration (NaN, infinite, negative or
    /// too large) falls back to the cap.
    fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .map_or(self.max_delay, |next| next.min(self.max_delay))
    }
}

/// Reviewer that retries the wrapped reviewer on transient failures
pub struct RetryingReviewer<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: ModelReviewer> RetryingReviewer<R> {
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn with_defaults(inner: R) -> Self {
        Self::new(inner, RetryPolicy::default())
    }
}

#[async_trait]
impl<R: ModelReviewer> ModelReviewer for RetryingReviewer<R> {
    async fn review(&self, prompt: &str) -> Result<String, ReviewerError> {
        let mut delay = self.policy.initial_delay;
        let mut attempt = 1;

        loop {
            match self.inner.review(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if !e.is_retryable() || attempt >= self.policy.max_attempts => {
                    return Err(e);
                }
                Err(e) => {
                    let wait = e
                        .retry_after()
                        .filter(|hint| *hint <= self.policy.max_delay)
                        .unwrap_or(delay);
                    warn!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "Reviewer call failed, retrying"
                    );
                    sleep(wait).await;
                    delay = self.policy.next_delay(delay);
                    attempt += 1;
                    debug!(attempt, "Retrying reviewer request");
                }
            }
        }
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
