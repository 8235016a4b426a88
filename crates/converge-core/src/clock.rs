// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Injectable time source.
//!
//! Every wall-clock-windowed component (quota counters, circuit breakers,
//! the conversation gate) reads the current instant through [`Clock`]
//! rather than calling `Utc::now()` directly, so tests can drive window
//! expiry deterministically. Production code uses [`SystemClock`]; tests
//! use [`ManualClock`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// A source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Shared handle to a clock, cloned into every timed component.
pub type SharedClock = Arc<dyn Clock>;

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. For tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
