// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnect supervision for long-lived platform connections.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use converge_core::ConvergeError;

use crate::retry::backoff_delay;

/// Drives reconnection attempts for a persistent connection with
/// exponential backoff between attempts.
///
/// `max_retries == 0` means retry forever; a chat relay that loses its
/// gateway connection should keep trying rather than give up. A non-zero
/// value bounds the attempts the same way [`crate::RetryPolicy`] does:
/// one initial attempt plus `max_retries` retries.
pub struct ReconnectSupervisor {
    dependency: String,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    connected: AtomicBool,
}

impl ReconnectSupervisor {
    pub fn new(
        dependency: impl Into<String>,
        max_retries: u32,
        base_delay: Duration,
        max_delay: Duration,
        exponential_base: f64,
    ) -> Self {
        Self {
            dependency: dependency.into(),
            max_retries,
            base_delay,
            max_delay,
            exponential_base,
            connected: AtomicBool::new(false),
        }
    }

    /// Run `connect` until it succeeds or the retry budget is exhausted.
    ///
    /// The connected flag is cleared on entry and set only after a
    /// successful attempt, so `is_connected` reads false for the whole
    /// reconnection window.
    pub async fn run<F, Fut>(&self, mut connect: F) -> Result<(), ConvergeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), ConvergeError>>,
    {
        self.connected.store(false, Ordering::Relaxed);
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            match connect().await {
                Ok(()) => {
                    self.connected.store(true, Ordering::Relaxed);
                    if attempt > 1 {
                        info!(
                            dependency = %self.dependency,
                            attempt,
                            "reconnected"
                        );
                    }
                    return Ok(());
                }
                Err(err) => {
                    if self.max_retries > 0 && attempt > self.max_retries {
                        warn!(
                            dependency = %self.dependency,
                            attempts = attempt,
                            error = %err,
                            "reconnect attempts exhausted"
                        );
                        return Err(ConvergeError::RetriesExhausted {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    let delay = backoff_delay(
                        self.base_delay,
                        self.max_delay,
                        self.exponential_base,
                        attempt,
                    );
                    warn!(
                        dependency = %self.dependency,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "connection attempt failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Whether the supervised connection is currently established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Mark the connection lost, e.g. when the read loop observes a
    /// disconnect before the next `run` begins.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }
}
