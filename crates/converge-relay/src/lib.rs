// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay orchestration for the Converge bridge.
//!
//! The [`Relay`] is the central coordinator that:
//! - Gates inbound messages (in-flight guard, dedup, throttle)
//! - Charges per-user and system AI quotas before any provider call
//! - Invokes the AI responder through retry and circuit-breaker layers
//! - Sends outbound messages within the monthly quota, parking overflow
//!   in a persistent queue
//! - Replays the overflow queue in bounded flush passes
//!
//! Platform adapters and the AI provider stay outside this crate, behind
//! the [`Responder`] and [`Transport`] traits.

pub mod metrics;
pub mod replies;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tracing::{debug, info, warn};

use converge_config::model::{ConvergeConfig, QuotaConfig};
use converge_core::{
    ConvergeError, InboundMessage, OutboundMessage, Platform, Responder, SharedClock, Transport,
    TurnRole, UserId,
};
use converge_gate::{ConversationGate, GateDecision};
use converge_quota::{QuotaRegistry, QuotaSnapshot, ResetPeriod, names};
use converge_resilience::{BreakerState, CircuitBreaker, ReconnectSupervisor, RetryPolicy};
use converge_storage::models::{SystemQuotaRow, UserQuotaRow};
use converge_storage::{Database, queries};

/// Dependency label for the AI provider breaker.
const AI_DEPENDENCY: &str = "gemini";
/// Dependency label for the platform send-API breaker.
const SEND_DEPENDENCY: &str = "line";

/// How an outbound message left [`Relay::send_or_queue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// Delivered to the platform.
    Sent,
    /// Parked in the overflow queue.
    Queued,
}

/// Result of one [`Relay::flush_queued`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Queued entries picked up by this pass.
    pub attempted: usize,
    /// Entries delivered and marked sent.
    pub delivered: usize,
    /// Entries skipped because their stored platform label is unknown.
    pub skipped: usize,
}

/// Health of one supervised platform connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionHealth {
    pub dependency: String,
    pub connected: bool,
}

/// Point-in-time view of the relay's protective state, for status surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct RelayHealth {
    pub ai_breaker: BreakerState,
    pub send_breaker: BreakerState,
    pub in_flight: usize,
    pub window_requests: u64,
    pub connections: Vec<ConnectionHealth>,
}

/// The central coordinator between platform adapters, the AI responder,
/// and the quota/resilience layers.
///
/// One instance exists per process. All methods take `&self`; the relay is
/// shared across the platform event loops behind an `Arc`.
pub struct Relay {
    config: ConvergeConfig,
    clock: SharedClock,
    registry: QuotaRegistry,
    gate: ConversationGate,
    retry: RetryPolicy,
    ai_breaker: CircuitBreaker,
    send_breaker: CircuitBreaker,
    db: Database,
    responder: Arc<dyn Responder>,
    transport: Arc<dyn Transport>,
    supervisors: Vec<Arc<ReconnectSupervisor>>,
    /// Set while monthly usage sits at or above the warning threshold, so
    /// the crossing is logged once rather than on every send.
    monthly_warned: AtomicBool,
}

impl Relay {
    /// Builds a relay from configuration and its collaborators, hydrating
    /// quota standing from storage.
    pub async fn new(
        config: ConvergeConfig,
        responder: Arc<dyn Responder>,
        transport: Arc<dyn Transport>,
        db: Database,
        supervisors: Vec<Arc<ReconnectSupervisor>>,
        clock: SharedClock,
    ) -> Result<Self, ConvergeError> {
        metrics::register_metrics();

        let registry = QuotaRegistry::new(clock.clone());
        hydrate_quotas(&registry, &db, &config.quota, &clock).await?;

        let gate = ConversationGate::new(
            &config.conversation,
            config.quota.ai_requests_per_minute,
            clock.clone(),
        );
        let retry = RetryPolicy::new(
            config.retry.max_retries,
            Duration::from_secs_f64(config.retry.base_delay_secs),
            Duration::from_secs_f64(config.retry.max_delay_secs),
            config.retry.exponential_base,
        );
        let recovery = Duration::from_secs(config.breaker.recovery_timeout_secs);
        let ai_breaker = CircuitBreaker::new(
            AI_DEPENDENCY,
            config.breaker.failure_threshold,
            recovery,
            clock.clone(),
        );
        let send_breaker = CircuitBreaker::new(
            SEND_DEPENDENCY,
            config.breaker.failure_threshold,
            recovery,
            clock.clone(),
        );

        info!(relay = config.relay.name.as_str(), "relay initialized");

        Ok(Self {
            config,
            clock,
            registry,
            gate,
            retry,
            ai_breaker,
            send_breaker,
            db,
            responder,
            transport,
            supervisors,
            monthly_warned: AtomicBool::new(false),
        })
    }

    /// Handles one inbound message end to end and returns the reply text.
    ///
    /// `None` means the gate rejected the message (already in flight,
    /// near-duplicate, or throttled) and nothing should be sent back.
    /// `Some` is either the generated reply or a fallback string; upstream
    /// failures never surface as errors on this path.
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Option<String> {
        metrics::record_message(&inbound.platform.to_string());
        debug!(
            user_id = %inbound.user_id,
            platform = %inbound.platform,
            "handling inbound message"
        );

        let decision = self.gate.admit(&inbound.user_id, &inbound.text);
        if decision != GateDecision::Proceed {
            metrics::record_gate_rejection(&decision.to_string());
            debug!(user_id = %inbound.user_id, decision = %decision, "inbound message gated");
            return None;
        }

        let reply = self.respond_admitted(&inbound).await;
        self.gate.release(&inbound.user_id);
        Some(reply)
    }

    /// The post-admission inbound path: quotas, the guarded AI call, and
    /// history recording. Always produces a reply string.
    async fn respond_admitted(&self, inbound: &InboundMessage) -> String {
        // Pre-check the breaker before charging anything: a rejection that
        // is already certain must not consume a quota unit.
        if !self.ai_breaker.is_call_permitted() {
            debug!(user_id = %inbound.user_id, "AI breaker open; skipping quota charge");
            return replies::AI_UNAVAILABLE.to_string();
        }

        let daily_name = names::ai_daily(&inbound.user_id);
        self.registry.get_or_create(
            &daily_name,
            self.config.quota.ai_daily_limit,
            ResetPeriod::Daily,
        );
        if !self.registry.try_consume(&daily_name) {
            metrics::record_quota_denial(names::AI_DAILY_KIND);
            info!(user_id = %inbound.user_id, "daily AI quota exhausted");
            return replies::daily_limit_reached(self.config.quota.ai_daily_limit);
        }
        self.persist_user_daily(&inbound.user_id).await;

        if !self.registry.try_consume(names::GEMINI_RPM) {
            metrics::record_quota_denial(names::GEMINI_RPM);
            info!(user_id = %inbound.user_id, "AI request rate exhausted");
            return replies::SYSTEM_BUSY.to_string();
        }
        self.persist_system_quota(names::GEMINI_RPM).await;

        let history = self.gate.history(&inbound.user_id);
        let state_before = self.ai_breaker.state();
        let outcome = self
            .retry
            .execute(|| {
                self.ai_breaker.call(|| {
                    self.responder
                        .generate(&inbound.user_id, &history, &inbound.text)
                })
            })
            .await;
        note_breaker_transition(&self.ai_breaker, state_before);

        match outcome {
            Ok(reply) => {
                self.gate
                    .record_turn(&inbound.user_id, TurnRole::User, inbound.text.clone());
                self.gate
                    .record_turn(&inbound.user_id, TurnRole::Assistant, reply.clone());
                info!(
                    user_id = %inbound.user_id,
                    platform = %inbound.platform,
                    "reply generated"
                );
                reply
            }
            Err(ConvergeError::BreakerOpen { dependency }) => {
                warn!(dependency = %dependency, "AI call rejected by open breaker");
                replies::AI_UNAVAILABLE.to_string()
            }
            Err(err) => {
                warn!(user_id = %inbound.user_id, error = %err, "AI call failed terminally");
                replies::GENERATION_FAILED.to_string()
            }
        }
    }

    /// Sends an outbound message within the monthly quota, parking it in
    /// the overflow queue when the quota is exhausted, the send breaker is
    /// open, or delivery fails.
    pub async fn send_or_queue(&self, msg: OutboundMessage) -> Result<SendOutcome, ConvergeError> {
        if !self.send_breaker.is_call_permitted() {
            warn!(dependency = SEND_DEPENDENCY, "send breaker open; queueing message");
            return self.park(&msg).await;
        }

        if !self.registry.try_consume(names::LINE_MONTHLY) {
            metrics::record_quota_denial(names::LINE_MONTHLY);
            info!("monthly send quota exhausted; queueing message");
            return self.park(&msg).await;
        }
        self.persist_system_quota(names::LINE_MONTHLY).await;
        self.note_monthly_usage();

        let state_before = self.send_breaker.state();
        let delivery = self
            .send_breaker
            .call(|| self.transport.deliver(msg.clone()))
            .await;
        note_breaker_transition(&self.send_breaker, state_before);

        match delivery {
            Ok(()) => {
                debug!(platform = %msg.platform, "outbound message delivered");
                Ok(SendOutcome::Sent)
            }
            Err(err) => {
                // The quota unit stays charged; whether the message reached
                // the platform is unknowable, and requeueing is the lossless
                // choice for an at-least-once bridge.
                warn!(error = %err, "delivery failed; queueing message");
                self.park(&msg).await
            }
        }
    }

    /// Replays up to `flush.batch_size` of the oldest queued messages.
    ///
    /// Each entry is re-delivered to the platform recorded on it, formatted
    /// as `[display_name] content` so late replays still show who wrote
    /// them. Only delivered entries are marked sent; failures stay queued
    /// for the next pass, and an open send breaker ends the pass early.
    pub async fn flush_queued(&self) -> Result<FlushReport, ConvergeError> {
        let batch = self.config.flush.batch_size as u32;
        let pending = queries::queue::peek_oldest(&self.db, batch).await?;
        if pending.is_empty() {
            debug!("overflow queue empty; nothing to flush");
            return Ok(FlushReport::default());
        }

        let mut report = FlushReport {
            attempted: pending.len(),
            ..FlushReport::default()
        };
        let mut delivered_ids = Vec::new();

        for row in &pending {
            let Ok(platform) = row.source_platform.parse::<Platform>() else {
                warn!(
                    id = row.id,
                    platform = %row.source_platform,
                    "skipping queued message with unknown platform label"
                );
                report.skipped += 1;
                continue;
            };
            let out = OutboundMessage {
                platform,
                display_name: row.source_display_name.clone(),
                content: format!("[{}] {}", row.source_display_name, row.content),
            };

            let state_before = self.send_breaker.state();
            let result = self.send_breaker.call(|| self.transport.deliver(out)).await;
            note_breaker_transition(&self.send_breaker, state_before);

            match result {
                Ok(()) => delivered_ids.push(row.id),
                Err(ConvergeError::BreakerOpen { dependency }) => {
                    warn!(
                        dependency = %dependency,
                        "send breaker open during flush; leaving remainder queued"
                    );
                    break;
                }
                Err(err) => {
                    warn!(id = row.id, error = %err, "flush delivery failed; entry stays queued");
                }
            }
        }

        if !delivered_ids.is_empty() {
            let marked = queries::queue::mark_sent(&self.db, &delivered_ids).await?;
            report.delivered = marked as usize;
            metrics::record_flushed(marked);
        }
        self.refresh_queue_depth().await;

        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            skipped = report.skipped,
            "flush pass complete"
        );
        Ok(report)
    }

    /// Messages currently waiting in the overflow queue.
    pub async fn queue_depth(&self) -> Result<u64, ConvergeError> {
        queries::queue::queue_depth(&self.db).await
    }

    /// Read-only view of every quota counter, sorted by name.
    pub fn quota_snapshot(&self) -> Vec<QuotaSnapshot> {
        self.registry.snapshot()
    }

    /// Breaker, gate, and connection state for status surfaces.
    pub fn health(&self) -> RelayHealth {
        RelayHealth {
            ai_breaker: self.ai_breaker.state(),
            send_breaker: self.send_breaker.state(),
            in_flight: self.gate.in_flight_count(),
            window_requests: self.gate.system_window_count(),
            connections: self
                .supervisors
                .iter()
                .map(|s| ConnectionHealth {
                    dependency: s.dependency().to_string(),
                    connected: s.is_connected(),
                })
                .collect(),
        }
    }

    /// The quota registry, for reporting collaborators.
    pub fn registry(&self) -> &QuotaRegistry {
        &self.registry
    }

    /// The conversation gate, for reporting collaborators.
    pub fn gate(&self) -> &ConversationGate {
        &self.gate
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Parks a message in the overflow queue.
    async fn park(&self, msg: &OutboundMessage) -> Result<SendOutcome, ConvergeError> {
        let id = queries::queue::enqueue(
            &self.db,
            &msg.platform.to_string(),
            &msg.display_name,
            &msg.content,
        )
        .await?;
        metrics::record_enqueued();
        self.refresh_queue_depth().await;
        info!(queued_id = id, platform = %msg.platform, "message parked in overflow queue");
        Ok(SendOutcome::Queued)
    }

    /// Logs a warning when monthly usage crosses the configured threshold.
    ///
    /// Returns whether a warning was emitted. Armed once per crossing: the
    /// flag clears when usage reads below the threshold again (after a
    /// monthly reset), not on every send.
    fn note_monthly_usage(&self) -> bool {
        let Some(percentage) = self.registry.usage_percentage(names::LINE_MONTHLY) else {
            return false;
        };
        let threshold = self.config.quota.warning_threshold * 100.0;
        if percentage >= threshold {
            let already = self.monthly_warned.swap(true, Ordering::Relaxed);
            if !already {
                warn!(
                    usage_percentage = percentage,
                    "monthly send quota nearing its limit"
                );
            }
            !already
        } else {
            self.monthly_warned.store(false, Ordering::Relaxed);
            false
        }
    }

    /// Writes the user's daily counter back to storage. Non-fatal: the
    /// in-memory registry stays authoritative while the process runs.
    async fn persist_user_daily(&self, user_id: &UserId) {
        let name = names::ai_daily(user_id);
        let Some(snap) = self.registry.snapshot_of(&name) else {
            return;
        };
        let row = UserQuotaRow {
            user_id: user_id.as_str().to_string(),
            quota_kind: names::AI_DAILY_KIND.to_string(),
            usage_count: snap.usage_count,
            limit_count: snap.limit_count,
            reset_period: snap.reset_period.clone(),
            last_reset: snap.last_reset_at.to_rfc3339(),
            updated_at: snap.updated_at.to_rfc3339(),
        };
        if let Err(err) = queries::quotas::upsert_user_quota(&self.db, &row).await {
            warn!(user_id = %user_id, error = %err, "failed to persist daily quota usage");
        }
    }

    /// Writes a system counter back to storage. Non-fatal, as above.
    async fn persist_system_quota(&self, name: &str) {
        let Some(snap) = self.registry.snapshot_of(name) else {
            return;
        };
        let row = SystemQuotaRow {
            name: name.to_string(),
            usage_count: snap.usage_count,
            limit_count: snap.limit_count,
            reset_period: snap.reset_period.clone(),
            last_reset: snap.last_reset_at.to_rfc3339(),
            updated_at: snap.updated_at.to_rfc3339(),
        };
        if let Err(err) = queries::quotas::upsert_system_quota(&self.db, &row).await {
            warn!(quota = %name, error = %err, "failed to persist system quota usage");
        }
    }

    async fn refresh_queue_depth(&self) {
        match queries::queue::queue_depth(&self.db).await {
            Ok(depth) => metrics::set_queue_depth(depth as f64),
            Err(err) => debug!(error = %err, "queue depth refresh failed"),
        }
    }
}

/// Seeds the registry from storage: the two system counters (created from
/// config when no row exists) and every persisted per-user daily counter.
/// Config limits win over stored limits, so an operator edit takes effect
/// on restart.
async fn hydrate_quotas(
    registry: &QuotaRegistry,
    db: &Database,
    quota: &QuotaConfig,
    clock: &SharedClock,
) -> Result<(), ConvergeError> {
    let system = [
        (
            names::GEMINI_RPM,
            quota.ai_requests_per_minute,
            ResetPeriod::Minute,
        ),
        (
            names::LINE_MONTHLY,
            quota.line_monthly_limit,
            ResetPeriod::Monthly,
        ),
    ];
    for (name, limit, period) in system {
        match queries::quotas::get_system_quota(db, name).await? {
            Some(row) => {
                let now = clock.now();
                registry.hydrate(
                    name,
                    row.usage_count,
                    limit,
                    &row.reset_period,
                    parse_ts(&row.last_reset, now),
                    parse_ts(&row.updated_at, now),
                );
            }
            None => {
                registry.get_or_create(name, limit, period);
            }
        }
    }

    let rows = queries::quotas::list_user_quotas(db, names::AI_DAILY_KIND).await?;
    let now = clock.now();
    for row in &rows {
        let name = names::ai_daily(&UserId::from(row.user_id.as_str()));
        registry.hydrate(
            &name,
            row.usage_count,
            quota.ai_daily_limit,
            &row.reset_period,
            parse_ts(&row.last_reset, now),
            parse_ts(&row.updated_at, now),
        );
    }
    if !rows.is_empty() {
        debug!(count = rows.len(), "hydrated per-user daily quotas");
    }
    Ok(())
}

/// Parses a stored RFC 3339 timestamp, falling back to `now` so a mangled
/// row starts a fresh window instead of aborting startup.
fn parse_ts(value: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(_) => {
            warn!(timestamp = %value, "unparseable stored timestamp; treating window as starting now");
            fallback
        }
    }
}

/// Records a metric when a guarded call changed the breaker's state.
fn note_breaker_transition(breaker: &CircuitBreaker, before: BreakerState) {
    let after = breaker.state();
    if after != before {
        metrics::record_breaker_transition(breaker.dependency(), &after.to_string());
    }
}
