use std::{future::Future, num::NonZeroUsize, time::Duration};

use kube::Error as KubeError;
use tokio::time::sleep;
use tracing::warn;

/// Retry policy applied to every API call a handler makes.
///
/// The default performs a single attempt, so API errors reach the caller
/// unchanged. Retries are opt-in through [`RetryPolicy::with_max_attempts`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts including the first call.
    pub max_attempts: NonZeroUsize,
    /// Initial wait duration before the next retry.
    pub initial_backoff: Duration,
    /// Upper bound for exponential backoff wait.
    pub max_backoff: Duration,
    /// Multiplication factor for exponential backoff.
    pub backoff_multiplier: f64,
    /// Error classifier for retry decisions.
    pub is_retryable: fn(&KubeError) -> bool,
}

impl RetryPolicy {
    /// Allow `retries` additional attempts after the first call.
    pub fn with_retries(self, retries: usize) -> Self {
        self.with_max_attempts(NonZeroUsize::MIN.saturating_add(retries))
    }

    pub fn with_max_attempts(mut self, max_attempts: NonZeroUsize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.backoff_multiplier = backoff_multiplier.max(1.0);
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: NonZeroUsize::MIN,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            is_retryable: default_retryable_error,
        }
    }
}

/// Default retry condition for [`kube::Error`].
///
/// For `Api` errors, retries only on transient HTTP status codes (`408`, `429`, `5xx`).
/// Not-found, conflict and validation failures are final. Transport errors are retried.
pub fn default_retryable_error(error: &KubeError) -> bool {
    match error {
        KubeError::Api(response) => matches!(response.code, 408 | 429 | 500..=599),
        KubeError::HyperError(_) | KubeError::Service(_) => true,
        _ => false,
    }
}

fn next_backoff(current: Duration, policy: &RetryPolicy) -> Duration {
    current
        .mul_f64(policy.backoff_multiplier.max(1.0))
        .min(policy.max_backoff)
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt limit is reached. The last error is returned unchanged.
pub async fn retry_with_policy<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, KubeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, KubeError>>,
{
    let mut backoff = policy.initial_backoff.min(policy.max_backoff);
    let mut attempts = 0usize;

    loop {
        attempts = attempts.saturating_add(1);
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempts >= policy.max_attempts.get() || !(policy.is_retryable)(&error) {
                    return Err(error);
                }
                warn!(attempts, ?backoff, %error, "retrying Kubernetes API call");
                sleep(backoff).await;
                backoff = next_backoff(backoff, policy);
            }
        }
    }
}
