// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A single named, time-windowed usage counter.
//!
//! Counters reset in place when their window elapses; they are never
//! deleted. Every read or mutation that depends on `usage_count` being
//! current runs the reset check first, in the same logical operation, so
//! no caller can observe stale usage across a reset boundary.
//!
//! Methods take `now` explicitly rather than reading a clock, which keeps
//! the counter pure; [`QuotaRegistry`](crate::QuotaRegistry) supplies the
//! instant from its injected clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

/// Reset window for a quota counter.
///
/// Windows are fixed durations; `Monthly` is a 30-day approximation, not
/// calendar-month-aware.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResetPeriod {
    Minute,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl ResetPeriod {
    /// The fixed duration of this window.
    pub fn window(self) -> chrono::Duration {
        match self {
            ResetPeriod::Minute => chrono::Duration::seconds(60),
            ResetPeriod::Hourly => chrono::Duration::seconds(3_600),
            ResetPeriod::Daily => chrono::Duration::seconds(86_400),
            ResetPeriod::Weekly => chrono::Duration::seconds(604_800),
            ResetPeriod::Monthly => chrono::Duration::seconds(30 * 86_400),
        }
    }
}

/// A named usage counter with reset-on-expiry semantics.
///
/// `reset_period` is `None` only when a stored row carried a period string
/// the current build does not recognize. Such a counter never resets: it
/// fails safe toward under-counting capacity instead of silently granting
/// unlimited use.
#[derive(Debug, Clone)]
pub struct QuotaCounter {
    name: String,
    usage_count: u64,
    limit_count: u64,
    reset_period: Option<ResetPeriod>,
    period_label: String,
    last_reset_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl QuotaCounter {
    /// Create a fresh counter with zero usage.
    pub fn new(
        name: impl Into<String>,
        limit_count: u64,
        period: ResetPeriod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            usage_count: 0,
            limit_count,
            reset_period: Some(period),
            period_label: period.to_string(),
            last_reset_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a counter from stored fields.
    ///
    /// The period arrives as a raw string from the database. An
    /// unrecognized value is a configuration error: it is logged here,
    /// once, and the counter is constructed without a reset window.
    pub fn from_stored(
        name: impl Into<String>,
        usage_count: u64,
        limit_count: u64,
        period: &str,
        last_reset_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let name = name.into();
        let parsed = period.parse::<ResetPeriod>();
        if parsed.is_err() {
            warn!(
                quota = %name,
                period = %period,
                "unknown reset period in stored quota; counter will never reset"
            );
        }
        Self {
            name,
            usage_count,
            limit_count,
            reset_period: parsed.ok(),
            period_label: period.to_string(),
            last_reset_at,
            updated_at,
        }
    }

    /// Reset usage to zero if the window has elapsed. Returns whether a
    /// reset occurred.
    ///
    /// The boundary is inclusive: an elapsed time of exactly one window
    /// resets. A counter without a valid period never resets.
    pub fn check_and_reset(&mut self, now: DateTime<Utc>) -> bool {
        let Some(period) = self.reset_period else {
            return false;
        };
        if now - self.last_reset_at >= period.window() {
            self.usage_count = 0;
            self.last_reset_at = now;
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    /// Whether another unit can be consumed.
    pub fn can_use(&mut self, now: DateTime<Utc>) -> bool {
        self.check_and_reset(now);
        self.usage_count < self.limit_count
    }

    /// Consume `amount` units, all or nothing.
    ///
    /// Returns false and leaves the counter unchanged if the increment
    /// would exceed the limit. There is no partial consumption.
    pub fn increment(&mut self, amount: u64, now: DateTime<Utc>) -> bool {
        self.check_and_reset(now);
        if self.usage_count.saturating_add(amount) <= self.limit_count {
            self.usage_count += amount;
            self.updated_at = now;
            true
        } else {
            false
        }
    }

    /// Units left in the current window, after a reset check.
    pub fn remaining(&mut self, now: DateTime<Utc>) -> u64 {
        self.check_and_reset(now);
        self.limit_count.saturating_sub(self.usage_count)
    }

    /// Usage as a percentage of the limit; 0 when the limit is 0.
    pub fn usage_percentage(&self) -> f64 {
        if self.limit_count == 0 {
            0.0
        } else {
            100.0 * self.usage_count as f64 / self.limit_count as f64
        }
    }

    /// Whether the window has elapsed relative to `now`, without mutating.
    ///
    /// Reporting paths use this to present a post-reset view while leaving
    /// the counter untouched.
    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.reset_period {
            Some(period) => now - self.last_reset_at >= period.window(),
            None => false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }

    pub fn limit_count(&self) -> u64 {
        self.limit_count
    }

    pub fn reset_period(&self) -> Option<ResetPeriod> {
        self.reset_period
    }

    /// The period as stored: the canonical label for valid periods, the
    /// original raw string for unrecognized ones.
    pub fn period_label(&self) -> &str {
        &self.period_label
    }

    pub fn last_reset_at(&self) -> DateTime<Utc> {
        self.last_reset_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
