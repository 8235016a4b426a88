// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded retry with exponential backoff.
//!
//! The policy is stateless: every `execute` starts fresh. Waits between
//! attempts are `tokio::time::sleep` suspension points, so a retrying call
//! never blocks the task driving other users' messages.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use converge_core::ConvergeError;

/// Compute the backoff delay before retry number `attempt` (1-based):
/// `min(base × exponential_base^(attempt − 1), max)`.
pub(crate) fn backoff_delay(
    base_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    attempt: u32,
) -> Duration {
    let exp = exponential_base.powi(attempt.saturating_sub(1).min(i32::MAX as u32) as i32);
    let raw = base_delay.as_secs_f64() * exp;
    // Clamp rather than trust the arithmetic: a huge exponent overflows to
    // infinity and a misconfigured base could go negative.
    let secs = if raw.is_finite() {
        raw.clamp(0.0, max_delay.as_secs_f64())
    } else {
        max_delay.as_secs_f64()
    };
    Duration::from_secs_f64(secs)
}

/// Exponential-backoff executor for fallible async operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        exponential_base: f64,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            exponential_base,
        }
    }

    /// The wait applied after the `attempt`-th failure (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        backoff_delay(
            self.base_delay,
            self.max_delay,
            self.exponential_base,
            attempt,
        )
    }

    /// Run `op`, retrying transient failures per [`ConvergeError::is_retryable`].
    ///
    /// `max_retries = 3` means up to 4 attempts total. When the budget is
    /// exhausted the last error is wrapped in
    /// [`ConvergeError::RetriesExhausted`] with the attempt count, so the
    /// terminal failure is never mistaken for a first-try error.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, ConvergeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ConvergeError>>,
    {
        self.execute_with(op, ConvergeError::is_retryable).await
    }

    /// Like [`execute`](Self::execute) with a caller-supplied retryable
    /// predicate. Non-retryable failures propagate immediately, unwrapped
    /// and without any delay.
    pub async fn execute_with<T, F, Fut, P>(
        &self,
        mut op: F,
        retryable: P,
    ) -> Result<T, ConvergeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ConvergeError>>,
        P: Fn(&ConvergeError) -> bool,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !retryable(&err) => {
                    debug!(error = %err, "non-retryable failure; propagating");
                    return Err(err);
                }
                Err(err) => {
                    if attempt > self.max_retries {
                        warn!(attempts = attempt, error = %err, "retry budget exhausted");
                        return Err(ConvergeError::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
