// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user conversation state and the admission decision for inbound
//! messages.
//!
//! The gate sits in front of every quota check and AI call. It tracks one
//! entry per user (bounded history, last message text, request timestamps)
//! plus two shared pieces of state: a set of user ids currently being
//! processed, and a rolling per-minute count of admitted requests across
//! all users.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};
use strum::Display;
use tracing::debug;

use converge_config::model::ConversationConfig;
use converge_core::{SharedClock, Turn, TurnRole, UserId};

use crate::similarity;

/// Outcome of asking the gate whether an inbound message may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum GateDecision {
    /// Admitted. The caller now holds the user's in-flight slot and must
    /// call [`ConversationGate::release`] when processing finishes.
    Proceed,
    /// A message from this user is already being processed.
    InFlight,
    /// The message is a near-duplicate of the user's previous one.
    NearDuplicate,
    /// The user asked again within the cooldown window while the
    /// system-wide request ceiling is reached.
    Throttled,
}

#[derive(Debug)]
struct UserEntry {
    history: VecDeque<Turn>,
    last_message_text: Option<String>,
    last_interaction_at: DateTime<Utc>,
    last_request_at: Option<DateTime<Utc>>,
}

impl UserEntry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            history: VecDeque::new(),
            last_message_text: None,
            last_interaction_at: now,
            last_request_at: None,
        }
    }

    /// Lazy idle expiry: conversations are cleared on next access rather
    /// than by a background sweep.
    fn clear_if_idle(&mut self, timeout: Duration, now: DateTime<Utc>) {
        if now - self.last_interaction_at >= timeout && !self.history.is_empty() {
            self.history.clear();
            self.last_message_text = None;
            self.last_request_at = None;
        }
    }
}

#[derive(Debug)]
struct SystemWindow {
    started_at: DateTime<Utc>,
    count: u64,
}

/// Decides whether inbound messages reach the AI responder.
///
/// Decision order for [`admit`](Self::admit): in-flight guard, then
/// near-duplicate suppression, then the system request-rate throttle.
/// Quota checks come after the gate and live in the quota registry.
pub struct ConversationGate {
    clock: SharedClock,
    conversation_timeout: Duration,
    max_history: usize,
    similarity_threshold: f64,
    max_length_diff: usize,
    cooldown: Duration,
    system_ceiling: u64,
    entries: DashMap<UserId, UserEntry>,
    in_flight: DashSet<UserId>,
    system_window: Mutex<SystemWindow>,
}

impl ConversationGate {
    /// `system_requests_per_minute` is the shared ceiling on admitted
    /// requests per cooldown window across all users; it is a request-rate
    /// dimension, separate from any per-user daily quota.
    pub fn new(
        config: &ConversationConfig,
        system_requests_per_minute: u64,
        clock: SharedClock,
    ) -> Self {
        let now = clock.now();
        Self {
            clock,
            conversation_timeout: Duration::seconds(config.timeout_secs as i64),
            max_history: config.max_history,
            similarity_threshold: config.similarity_threshold,
            max_length_diff: config.max_length_diff,
            cooldown: Duration::seconds(config.cooldown_secs as i64),
            system_ceiling: system_requests_per_minute,
            entries: DashMap::new(),
            in_flight: DashSet::new(),
            system_window: Mutex::new(SystemWindow {
                started_at: now,
                count: 0,
            }),
        }
    }

    /// Run the full admission decision for an inbound message.
    ///
    /// On [`GateDecision::Proceed`] the user's in-flight slot is held and
    /// the request is counted toward the rolling system window; every other
    /// decision leaves gate state as it was.
    pub fn admit(&self, user_id: &UserId, text: &str) -> GateDecision {
        if !self.in_flight.insert(user_id.clone()) {
            debug!(user_id = %user_id, "message rejected: already processing");
            return GateDecision::InFlight;
        }

        if self.is_near_duplicate(user_id, text) {
            self.in_flight.remove(user_id);
            debug!(user_id = %user_id, "message rejected: near-duplicate");
            return GateDecision::NearDuplicate;
        }

        if self.should_throttle(user_id) {
            self.in_flight.remove(user_id);
            debug!(user_id = %user_id, "message rejected: system request rate");
            return GateDecision::Throttled;
        }

        self.record_request(user_id);
        GateDecision::Proceed
    }

    /// Free the user's in-flight slot after an admitted message finishes,
    /// whether processing succeeded or failed.
    pub fn release(&self, user_id: &UserId) {
        self.in_flight.remove(user_id);
    }

    /// Whether the user should be throttled right now: true only when the
    /// user has a request inside the cooldown window AND the system-wide
    /// window count has reached the ceiling.
    pub fn should_throttle(&self, user_id: &UserId) -> bool {
        let now = self.clock.now();

        let user_recent = match self.entries.get_mut(user_id) {
            Some(mut entry) => {
                entry.clear_if_idle(self.conversation_timeout, now);
                entry
                    .last_request_at
                    .map(|at| now - at < self.cooldown)
                    .unwrap_or(false)
            }
            None => false,
        };
        if !user_recent {
            return false;
        }

        let window = self.lock_window();
        let window_live = now - window.started_at < self.cooldown;
        window_live && window.count >= self.system_ceiling
    }

    /// Whether `text` is a near-duplicate of the user's previous message.
    ///
    /// Positional-overlap heuristic over unnormalized text; see the
    /// [`similarity`] module for its known limitations.
    pub fn is_near_duplicate(&self, user_id: &UserId, text: &str) -> bool {
        let now = self.clock.now();
        let Some(mut entry) = self.entries.get_mut(user_id) else {
            return false;
        };
        entry.clear_if_idle(self.conversation_timeout, now);
        match entry.last_message_text.as_deref() {
            Some(last) => similarity::is_near_duplicate(
                text,
                last,
                self.similarity_threshold,
                self.max_length_diff,
            ),
            None => false,
        }
    }

    /// Append a turn to the user's bounded history, evicting the oldest
    /// when the configured maximum is exceeded.
    pub fn record_turn(&self, user_id: &UserId, role: TurnRole, content: impl Into<String>) {
        let now = self.clock.now();
        let content = content.into();
        let mut entry = self
            .entries
            .entry(user_id.clone())
            .or_insert_with(|| UserEntry::new(now));
        entry.clear_if_idle(self.conversation_timeout, now);

        if role == TurnRole::User {
            entry.last_message_text = Some(content.clone());
        }
        entry.history.push_back(Turn::new(role, content));
        while entry.history.len() > self.max_history {
            entry.history.pop_front();
        }
        entry.last_interaction_at = now;
    }

    /// The user's current history, oldest first.
    pub fn history(&self, user_id: &UserId) -> Vec<Turn> {
        let now = self.clock.now();
        match self.entries.get_mut(user_id) {
            Some(mut entry) => {
                entry.clear_if_idle(self.conversation_timeout, now);
                entry.history.iter().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Count an admitted request: stamps the user's last-request time and
    /// bumps the rolling system window, starting a new window when the
    /// previous one has aged out.
    fn record_request(&self, user_id: &UserId) {
        let now = self.clock.now();
        self.entries
            .entry(user_id.clone())
            .or_insert_with(|| UserEntry::new(now))
            .last_request_at = Some(now);

        let mut window = self.lock_window();
        if now - window.started_at >= self.cooldown {
            window.started_at = now;
            window.count = 0;
        }
        window.count += 1;
    }

    /// Admitted requests in the current rolling window, for reporting.
    pub fn system_window_count(&self) -> u64 {
        let now = self.clock.now();
        let window = self.lock_window();
        if now - window.started_at >= self.cooldown {
            0
        } else {
            window.count
        }
    }

    /// Users with a message currently being processed.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn lock_window(&self) -> std::sync::MutexGuard<'_, SystemWindow> {
        self.system_window
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::TimeZone;
    use converge_core::ManualClock;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn config() -> ConversationConfig {
        ConversationConfig::default()
    }

    fn gate_with_clock(ceiling: u64) -> (ConversationGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let gate = ConversationGate::new(&config(), ceiling, clock.clone());
        (gate, clock)
    }

    fn uid(s: &str) -> UserId {
        UserId::from(s)
    }

    #[test]
    fn first_message_proceeds_and_holds_slot() {
        let (gate, _clock) = gate_with_clock(30);
        let user = uid("U1");
        assert_eq!(gate.admit(&user, "Hello there"), GateDecision::Proceed);
        assert_eq!(gate.in_flight_count(), 1);

        gate.release(&user);
        assert_eq!(gate.in_flight_count(), 0);
    }

    #[test]
    fn second_message_while_in_flight_is_rejected() {
        let (gate, _clock) = gate_with_clock(30);
        let user = uid("U1");
        assert_eq!(gate.admit(&user, "first"), GateDecision::Proceed);
        assert_eq!(gate.admit(&user, "second"), GateDecision::InFlight);

        // A different user is unaffected.
        assert_eq!(gate.admit(&uid("U2"), "hi"), GateDecision::Proceed);

        gate.release(&user);
        assert_eq!(gate.admit(&user, "third"), GateDecision::Proceed);
    }

    #[test]
    fn near_duplicate_of_last_message_is_rejected() {
        let (gate, _clock) = gate_with_clock(30);
        let user = uid("U1");
        gate.record_turn(&user, TurnRole::User, "Hello there");

        assert_eq!(gate.admit(&user, "Hello there!"), GateDecision::NearDuplicate);
        // Rejection releases the slot it briefly held.
        assert_eq!(gate.in_flight_count(), 0);

        assert_eq!(gate.admit(&user, "Goodbye now"), GateDecision::Proceed);
    }

    #[test]
    fn duplicate_check_compares_against_last_user_turn_only() {
        let (gate, _clock) = gate_with_clock(30);
        let user = uid("U1");
        gate.record_turn(&user, TurnRole::User, "What is Rust?");
        gate.record_turn(&user, TurnRole::Assistant, "A systems language.");

        // The assistant turn does not become the comparison target.
        assert!(gate.is_near_duplicate(&user, "What is Rust?!"));
        assert!(!gate.is_near_duplicate(&user, "A systems language?"));
    }

    #[test]
    fn throttles_only_when_user_recent_and_system_at_ceiling() {
        let (gate, clock) = gate_with_clock(2);
        let u1 = uid("U1");
        let u2 = uid("U2");
        let u3 = uid("U3");

        assert_eq!(gate.admit(&u1, "one"), GateDecision::Proceed);
        gate.release(&u1);
        assert_eq!(gate.admit(&u2, "two"), GateDecision::Proceed);
        gate.release(&u2);

        // System at ceiling now, but U3 has no recent request: not throttled.
        assert_eq!(gate.admit(&u3, "three"), GateDecision::Proceed);
        gate.release(&u3);

        // U1 asked 10 seconds ago and the ceiling is reached: throttled.
        clock.advance(Duration::seconds(10));
        assert_eq!(gate.admit(&u1, "again"), GateDecision::Throttled);

        // Once the window ages out the same user is admitted again.
        clock.advance(Duration::seconds(60));
        assert_eq!(gate.admit(&u1, "later"), GateDecision::Proceed);
        gate.release(&u1);
    }

    #[test]
    fn system_window_resets_after_cooldown() {
        let (gate, clock) = gate_with_clock(30);
        for i in 0..5 {
            let user = uid(&format!("U{i}"));
            gate.admit(&user, "hello");
            gate.release(&user);
        }
        assert_eq!(gate.system_window_count(), 5);

        clock.advance(Duration::seconds(60));
        assert_eq!(gate.system_window_count(), 0);
    }

    #[test]
    fn history_is_bounded_fifo() {
        let (gate, _clock) = gate_with_clock(30);
        let user = uid("U1");
        for i in 0..15 {
            gate.record_turn(&user, TurnRole::User, format!("msg {i}"));
        }

        let history = gate.history(&user);
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].content, "msg 5", "oldest turns evicted first");
        assert_eq!(history[9].content, "msg 14");
    }

    #[test]
    fn idle_conversation_clears_lazily() {
        let (gate, clock) = gate_with_clock(30);
        let user = uid("U1");
        gate.record_turn(&user, TurnRole::User, "Hello there");
        gate.record_turn(&user, TurnRole::Assistant, "Hi!");
        assert_eq!(gate.history(&user).len(), 2);

        // 30 minutes idle: the next access observes an empty conversation.
        clock.advance(Duration::seconds(1800));
        assert_eq!(gate.history(&user), Vec::new());

        // The stale last message no longer counts as a duplicate target.
        assert!(!gate.is_near_duplicate(&user, "Hello there"));
        assert_eq!(gate.admit(&user, "Hello there"), GateDecision::Proceed);
    }

    #[test]
    fn recording_after_idle_clear_starts_fresh_history() {
        let (gate, clock) = gate_with_clock(30);
        let user = uid("U1");
        gate.record_turn(&user, TurnRole::User, "old message");

        clock.advance(Duration::seconds(3600));
        gate.record_turn(&user, TurnRole::User, "new conversation");

        let history = gate.history(&user);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "new conversation");
    }

    #[test]
    fn unknown_user_reads_are_empty_and_permissive() {
        let (gate, _clock) = gate_with_clock(30);
        let user = uid("nobody");
        assert!(gate.history(&user).is_empty());
        assert!(!gate.should_throttle(&user));
        assert!(!gate.is_near_duplicate(&user, "anything"));
    }

    #[test]
    fn concurrent_admits_hold_one_slot_per_user() {
        let (gate, _clock) = gate_with_clock(1000);
        let gate = Arc::new(gate);
        let user = uid("U1");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let gate = Arc::clone(&gate);
            let user = user.clone();
            handles.push(std::thread::spawn(move || gate.admit(&user, "race")));
        }
        let decisions: Vec<GateDecision> = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect();

        let admitted = decisions
            .iter()
            .filter(|d| **d == GateDecision::Proceed)
            .count();
        assert_eq!(admitted, 1, "exactly one concurrent admit may win");
        assert!(decisions
            .iter()
            .all(|d| matches!(d, GateDecision::Proceed | GateDecision::InFlight)));
    }

    #[test]
    fn decision_labels_are_snake_case() {
        assert_eq!(GateDecision::NearDuplicate.to_string(), "near_duplicate");
        assert_eq!(GateDecision::InFlight.to_string(), "in_flight");
    }
}
