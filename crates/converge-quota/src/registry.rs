// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The quota registry: one owner for every counter in the process.
//!
//! Counters live in a concurrent map keyed by quota name. Each operation
//! holds the entry guard for the whole check-and-increment, so
//! `try_consume` is atomic per key: concurrent callers can never observe
//! `can_use() == true` and then lose a race to `increment()`.
//!
//! The registry is constructed once at startup and injected into every
//! consumer; there is no global instance.

use chrono::{DateTime, Utc};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use converge_core::SharedClock;

use crate::counter::{QuotaCounter, ResetPeriod};

/// Read-only view of one counter for reporting collaborators.
///
/// Built without mutating the counter: if the window has elapsed the view
/// shows post-reset numbers while the stored counter is left untouched.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaSnapshot {
    pub name: String,
    pub usage_count: u64,
    pub limit_count: u64,
    pub remaining: u64,
    pub usage_percentage: f64,
    pub reset_period: String,
    pub last_reset_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Owns the mapping of quota names to counters.
pub struct QuotaRegistry {
    clock: SharedClock,
    counters: DashMap<String, QuotaCounter>,
}

impl QuotaRegistry {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            counters: DashMap::new(),
        }
    }

    /// Return the counter for `name`, creating it with zero usage if absent.
    ///
    /// Idempotent: an existing counter is returned as-is; `limit` and
    /// `period` only apply on first creation.
    pub fn get_or_create(
        &self,
        name: &str,
        limit: u64,
        period: ResetPeriod,
    ) -> RefMut<'_, String, QuotaCounter> {
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| QuotaCounter::new(name, limit, period, self.clock.now()))
    }

    /// Seed a counter from stored fields unless one already exists.
    ///
    /// Used at startup to carry quota standing across restarts. Unknown
    /// period strings are tolerated (the counter then never resets, see
    /// [`QuotaCounter::from_stored`]).
    pub fn hydrate(
        &self,
        name: &str,
        usage_count: u64,
        limit_count: u64,
        period: &str,
        last_reset_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) {
        self.counters.entry(name.to_string()).or_insert_with(|| {
            QuotaCounter::from_stored(
                name,
                usage_count,
                limit_count,
                period,
                last_reset_at,
                updated_at,
            )
        });
    }

    /// Atomic check-and-increment of one unit. The operation used by
    /// message-handling code.
    ///
    /// An unregistered name denies and warns: counters are created through
    /// `get_or_create`, and consuming a quota nobody registered is a wiring
    /// error that must fail closed.
    pub fn try_consume(&self, name: &str) -> bool {
        self.try_consume_amount(name, 1)
    }

    /// Atomic check-and-increment of `amount` units, all or nothing.
    pub fn try_consume_amount(&self, name: &str, amount: u64) -> bool {
        let now = self.clock.now();
        match self.counters.get_mut(name) {
            Some(mut counter) => {
                let allowed = counter.increment(amount, now);
                if !allowed {
                    debug!(
                        quota = %name,
                        usage = counter.usage_count(),
                        limit = counter.limit_count(),
                        "quota denied"
                    );
                }
                allowed
            }
            None => {
                warn!(quota = %name, "try_consume on unregistered quota; denying");
                false
            }
        }
    }

    /// Advisory check without consuming. Reporting and pre-flight only;
    /// message-handling code must use [`try_consume`](Self::try_consume).
    pub fn can_use(&self, name: &str) -> bool {
        let now = self.clock.now();
        match self.counters.get_mut(name) {
            Some(mut counter) => counter.can_use(now),
            None => {
                warn!(quota = %name, "can_use on unregistered quota; denying");
                false
            }
        }
    }

    /// Advisory consume of `amount` units. Same per-key atomicity as
    /// `try_consume`; kept as a separate name for non-inbound paths.
    pub fn consume(&self, name: &str, amount: u64) -> bool {
        self.try_consume_amount(name, amount)
    }

    /// Units left for `name`, after a reset check. `None` if unregistered.
    pub fn remaining(&self, name: &str) -> Option<u64> {
        let now = self.clock.now();
        self.counters
            .get_mut(name)
            .map(|mut counter| counter.remaining(now))
    }

    /// Usage percentage for `name`. `None` if unregistered.
    pub fn usage_percentage(&self, name: &str) -> Option<f64> {
        self.counters
            .get(name)
            .map(|counter| counter.usage_percentage())
    }

    /// Snapshot one counter without mutating it.
    pub fn snapshot_of(&self, name: &str) -> Option<QuotaSnapshot> {
        let now = self.clock.now();
        self.counters
            .get(name)
            .map(|counter| Self::view(&counter, now))
    }

    /// Snapshot every counter, sorted by name, without mutating any.
    pub fn snapshot(&self) -> Vec<QuotaSnapshot> {
        let now = self.clock.now();
        let mut views: Vec<QuotaSnapshot> = self
            .counters
            .iter()
            .map(|entry| Self::view(entry.value(), now))
            .collect();
        views.sort_by(|a, b| a.name.cmp(&b.name));
        views
    }

    fn view(counter: &QuotaCounter, now: DateTime<Utc>) -> QuotaSnapshot {
        let elapsed = counter.window_elapsed(now);
        let usage = if elapsed { 0 } else { counter.usage_count() };
        let limit = counter.limit_count();
        let percentage = if limit == 0 {
            0.0
        } else {
            100.0 * usage as f64 / limit as f64
        };
        QuotaSnapshot {
            name: counter.name().to_string(),
            usage_count: usage,
            limit_count: limit,
            remaining: limit.saturating_sub(usage),
            usage_percentage: percentage,
            reset_period: counter.period_label().to_string(),
            last_reset_at: counter.last_reset_at(),
            updated_at: counter.updated_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use converge_core::SystemClock;

    fn registry() -> QuotaRegistry {
        QuotaRegistry::new(Arc::new(SystemClock))
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let registry = registry();
        {
            let mut counter = registry.get_or_create("ai_daily:u1", 20, ResetPeriod::Daily);
            assert!(counter.increment(3, chrono::Utc::now()));
        }
        // Second call returns the same counter; limit/period args are ignored.
        let counter = registry.get_or_create("ai_daily:u1", 999, ResetPeriod::Minute);
        assert_eq!(counter.usage_count(), 3);
        assert_eq!(counter.limit_count(), 20);
        assert_eq!(counter.reset_period(), Some(ResetPeriod::Daily));
    }

    #[test]
    fn try_consume_counts_down_to_denial() {
        let registry = registry();
        registry.get_or_create("gemini_rpm", 3, ResetPeriod::Minute);

        assert!(registry.try_consume("gemini_rpm"));
        assert!(registry.try_consume("gemini_rpm"));
        assert!(registry.try_consume("gemini_rpm"));
        assert!(!registry.try_consume("gemini_rpm"));
        assert_eq!(registry.remaining("gemini_rpm"), Some(0));
    }

    #[test]
    fn unregistered_names_deny_everything() {
        let registry = registry();
        assert!(!registry.try_consume("nobody"));
        assert!(!registry.can_use("nobody"));
        assert_eq!(registry.remaining("nobody"), None);
        assert!(registry.snapshot_of("nobody").is_none());
    }

    #[test]
    fn hydrate_seeds_only_missing_counters() {
        let registry = registry();
        let then = chrono::Utc::now() - chrono::Duration::seconds(30);
        registry.hydrate("line_monthly", 400, 500, "monthly", then, then);
        assert_eq!(registry.remaining("line_monthly"), Some(100));

        // A second hydrate for the same name is ignored.
        registry.hydrate("line_monthly", 0, 500, "monthly", then, then);
        assert_eq!(registry.remaining("line_monthly"), Some(100));
    }

    #[test]
    fn snapshot_reports_without_mutating() {
        let registry = registry();
        registry.get_or_create("ai_daily:u1", 20, ResetPeriod::Daily);
        for _ in 0..5 {
            registry.try_consume("ai_daily:u1");
        }

        let snapshots = registry.snapshot();
        assert_eq!(snapshots.len(), 1);
        let snap = &snapshots[0];
        assert_eq!(snap.name, "ai_daily:u1");
        assert_eq!(snap.usage_count, 5);
        assert_eq!(snap.remaining, 15);
        assert!((snap.usage_percentage - 25.0).abs() < f64::EPSILON);
        assert_eq!(snap.reset_period, "daily");
    }

    #[test]
    fn snapshot_is_sorted_by_name() {
        let registry = registry();
        registry.get_or_create("line_monthly", 500, ResetPeriod::Monthly);
        registry.get_or_create("ai_daily:u1", 20, ResetPeriod::Daily);
        registry.get_or_create("gemini_rpm", 30, ResetPeriod::Minute);

        let names: Vec<String> = registry.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["ai_daily:u1", "gemini_rpm", "line_monthly"]);
    }

    // 100 concurrent consumers against a limit of 10: exactly 10 must win.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn try_consume_is_atomic_under_contention() {
        let registry = Arc::new(registry());
        registry.get_or_create("contended", 10, ResetPeriod::Daily);

        let mut handles = Vec::with_capacity(100);
        for _ in 0..100 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.try_consume("contended") }));
        }

        let mut successes = 0;
        let mut failures = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            } else {
                failures += 1;
            }
        }

        assert_eq!(successes, 10, "exactly the limit may be consumed");
        assert_eq!(failures, 90);
        assert_eq!(registry.remaining("contended"), Some(0));
    }

    #[test]
    fn snapshot_serializes_for_dashboards() {
        let registry = registry();
        registry.get_or_create("gemini_rpm", 30, ResetPeriod::Minute);
        let snap = registry.snapshot_of("gemini_rpm").unwrap();
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"name\":\"gemini_rpm\""));
        assert!(json.contains("\"limit_count\":30"));
    }
}
