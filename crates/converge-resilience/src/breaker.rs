// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-dependency circuit breaker.
//!
//! One breaker instance guards each flaky external dependency (the AI
//! provider, the platform send API). The state machine lives behind a
//! mutex held only for transitions, never across the wrapped call, so the
//! breaker is safe to share between concurrent callers. The HalfOpen
//! single-trial rule is enforced with a trial-in-flight flag taken under
//! that same lock: racing callers lose with a breaker-open rejection
//! rather than both probing the dependency.

use std::future::Future;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tracing::{info, warn};

use converge_core::{ConvergeError, SharedClock};

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure_at: Option<DateTime<Utc>>,
    trial_in_flight: bool,
}

/// Failure-tracking state machine protecting one external dependency.
pub struct CircuitBreaker {
    dependency: String,
    failure_threshold: u32,
    recovery_timeout: chrono::Duration,
    clock: SharedClock,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(
        dependency: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: std::time::Duration,
        clock: SharedClock,
    ) -> Self {
        Self {
            dependency: dependency.into(),
            failure_threshold,
            recovery_timeout: chrono::Duration::from_std(recovery_timeout)
                .unwrap_or(chrono::TimeDelta::MAX),
            clock,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Run `op` under the breaker.
    ///
    /// Open state rejects with [`ConvergeError::BreakerOpen`] before `op`
    /// is invoked. The rejection error names the dependency so callers can
    /// surface a distinct "temporarily unavailable" message.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, ConvergeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ConvergeError>>,
    {
        let trial = self.admit()?;
        match op().await {
            Ok(value) => {
                self.on_success(trial);
                Ok(value)
            }
            Err(err) => {
                self.on_failure(trial);
                Err(err)
            }
        }
    }

    /// Decide whether a call may proceed; returns whether it is the
    /// HalfOpen trial. Transitions Open to HalfOpen when the recovery
    /// timeout has elapsed.
    fn admit(&self) -> Result<bool, ConvergeError> {
        let now = self.clock.now();
        let mut inner = self.lock_inner();
        match inner.state {
            BreakerState::Closed => Ok(false),
            BreakerState::Open => {
                let recovered = inner
                    .last_failure_at
                    .map(|at| now - at >= self.recovery_timeout)
                    .unwrap_or(true);
                if recovered {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!(dependency = %self.dependency, "breaker half-open; admitting trial call");
                    Ok(true)
                } else {
                    Err(self.rejection())
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    Err(self.rejection())
                } else {
                    inner.trial_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock_inner();
        if trial {
            inner.trial_in_flight = false;
        }
        if inner.state != BreakerState::Closed {
            info!(dependency = %self.dependency, "breaker closed");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
    }

    fn on_failure(&self, trial: bool) {
        let now = self.clock.now();
        let mut inner = self.lock_inner();
        if trial {
            inner.trial_in_flight = false;
        }
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Open;
            inner.last_failure_at = Some(now);
            warn!(dependency = %self.dependency, "trial call failed; breaker re-opened");
        } else if inner.consecutive_failures >= self.failure_threshold {
            inner.state = BreakerState::Open;
            inner.last_failure_at = Some(now);
            warn!(
                dependency = %self.dependency,
                failures = inner.consecutive_failures,
                "failure threshold reached; breaker opened"
            );
        }
    }

    /// Whether a call made right now would be admitted, without mutating
    /// any state. Used by callers that want to avoid side effects (such as
    /// charging a quota) ahead of a call that would only be rejected.
    pub fn is_call_permitted(&self) -> bool {
        let now = self.clock.now();
        let inner = self.lock_inner();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => inner
                .last_failure_at
                .map(|at| now - at >= self.recovery_timeout)
                .unwrap_or(true),
            BreakerState::HalfOpen => !inner.trial_in_flight,
        }
    }

    /// Current state, for reporting. An Open breaker whose recovery
    /// timeout has elapsed still reads Open until the next call flips it.
    pub fn state(&self) -> BreakerState {
        self.lock_inner().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock_inner().consecutive_failures
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Manual operator reset to Closed.
    pub fn reset(&self) {
        let mut inner = self.lock_inner();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.last_failure_at = None;
        inner.trial_in_flight = false;
        info!(dependency = %self.dependency, "breaker manually reset");
    }

    fn rejection(&self) -> ConvergeError {
        ConvergeError::BreakerOpen {
            dependency: self.dependency.clone(),
        }
    }

    // A poisoned lock only means another caller panicked mid-transition;
    // the state itself is a plain struct, so take it as-is.
    fn lock_inner(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
