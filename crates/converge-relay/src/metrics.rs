// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Installing a recorder is the embedding
//! process's concern; without one every call here is a no-op.

use metrics::{describe_counter, describe_gauge};

/// Register all Converge metric descriptions.
///
/// Called once during [`crate::Relay::new`]; repeat calls are harmless.
pub fn register_metrics() {
    describe_counter!("converge_messages_total", "Inbound messages received");
    describe_counter!(
        "converge_gate_rejections_total",
        "Inbound messages rejected by the conversation gate"
    );
    describe_counter!("converge_quota_denials_total", "Quota check-and-consume denials");
    describe_counter!(
        "converge_breaker_transitions_total",
        "Circuit breaker state transitions"
    );
    describe_counter!(
        "converge_queue_enqueued_total",
        "Messages parked in the overflow queue"
    );
    describe_counter!(
        "converge_queue_flushed_total",
        "Queued messages delivered by flush passes"
    );
    describe_gauge!("converge_queue_depth", "Messages waiting in the overflow queue");
}

/// Record an inbound message.
pub fn record_message(platform: &str) {
    metrics::counter!("converge_messages_total", "platform" => platform.to_string()).increment(1);
}

/// Record a gate rejection by decision label.
pub fn record_gate_rejection(reason: &str) {
    metrics::counter!("converge_gate_rejections_total", "reason" => reason.to_string())
        .increment(1);
}

/// Record a quota denial by quota kind (never per-user names).
pub fn record_quota_denial(quota: &str) {
    metrics::counter!("converge_quota_denials_total", "quota" => quota.to_string()).increment(1);
}

/// Record a breaker state transition observed around a guarded call.
pub fn record_breaker_transition(dependency: &str, to_state: &str) {
    metrics::counter!(
        "converge_breaker_transitions_total",
        "dependency" => dependency.to_string(),
        "to" => to_state.to_string()
    )
    .increment(1);
}

/// Record one message parked in the overflow queue.
pub fn record_enqueued() {
    metrics::counter!("converge_queue_enqueued_total").increment(1);
}

/// Record messages delivered by a flush pass.
pub fn record_flushed(count: u64) {
    metrics::counter!("converge_queue_flushed_total").increment(count);
}

/// Set the current overflow queue depth.
pub fn set_queue_depth(depth: f64) {
    metrics::gauge!("converge_queue_depth").set(depth);
}
