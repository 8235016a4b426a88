// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Converge relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Converge configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to the limits the relay
/// shipped with.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConvergeConfig {
    /// Relay identity and logging settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Quota limits for the three protected upstream resources.
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Conversation gating: history, dedup, and throttle settings.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Retry policy for upstream API calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Circuit breaker settings for flaky dependencies.
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Reconnect supervision for long-lived platform sessions.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Overflow queue flush settings.
    #[serde(default)]
    pub flush: FlushConfig,
}

/// Relay identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Display name of this relay deployment.
    #[serde(default = "default_relay_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: default_relay_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_relay_name() -> String {
    "converge".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Quota limits for the protected upstream resources.
///
/// A limit of `0` is a kill switch: the counter exists but denies every
/// request. Limits are not validated positive for that reason.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Per-user daily cap on AI generations.
    #[serde(default = "default_ai_daily_limit")]
    pub ai_daily_limit: u64,

    /// System-wide AI requests-per-minute cap.
    #[serde(default = "default_ai_requests_per_minute")]
    pub ai_requests_per_minute: u64,

    /// System-wide monthly cap on bridged-platform message sends.
    #[serde(default = "default_line_monthly_limit")]
    pub line_monthly_limit: u64,

    /// Fraction of a quota at which a usage warning is logged (0.0-1.0].
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            ai_daily_limit: default_ai_daily_limit(),
            ai_requests_per_minute: default_ai_requests_per_minute(),
            line_monthly_limit: default_line_monthly_limit(),
            warning_threshold: default_warning_threshold(),
        }
    }
}

fn default_ai_daily_limit() -> u64 {
    20
}

fn default_ai_requests_per_minute() -> u64 {
    30
}

fn default_line_monthly_limit() -> u64 {
    500
}

fn default_warning_threshold() -> f64 {
    0.9
}

/// Conversation gating configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Seconds of idle time after which a user's history is cleared.
    #[serde(default = "default_conversation_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum turns kept per user; oldest evicted first.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Positional-overlap ratio above which a message counts as a
    /// near-duplicate of the user's previous one (0.0-1.0].
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Maximum character-length difference for the near-duplicate check
    /// to apply at all.
    #[serde(default = "default_max_length_diff")]
    pub max_length_diff: usize,

    /// Width of the rolling window, in seconds, for both the per-user
    /// recent-request check and the system request-rate ceiling.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_conversation_timeout_secs(),
            max_history: default_max_history(),
            similarity_threshold: default_similarity_threshold(),
            max_length_diff: default_max_length_diff(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

fn default_conversation_timeout_secs() -> u64 {
    1800
}

fn default_max_history() -> usize {
    10
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_max_length_diff() -> usize {
    5
}

fn default_cooldown_secs() -> u64 {
    60
}

/// Retry policy configuration for upstream API calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the initial attempt; 3 means 4 attempts total.
    #[serde(default = "default_retry_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in seconds.
    #[serde(default = "default_retry_base_delay_secs")]
    pub base_delay_secs: f64,

    /// Ceiling on any single backoff delay in seconds.
    #[serde(default = "default_retry_max_delay_secs")]
    pub max_delay_secs: f64,

    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_retry_max_retries(),
            base_delay_secs: default_retry_base_delay_secs(),
            max_delay_secs: default_retry_max_delay_secs(),
            exponential_base: default_exponential_base(),
        }
    }
}

fn default_retry_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_secs() -> f64 {
    1.0
}

fn default_retry_max_delay_secs() -> f64 {
    60.0
}

fn default_exponential_base() -> f64 {
    2.0
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the breaker stays open before admitting a trial call.
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_secs() -> u64 {
    60
}

/// Reconnect supervision configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    /// Connection retries before giving up; 0 retries forever.
    #[serde(default = "default_reconnect_max_retries")]
    pub max_retries: u32,

    /// First reconnect backoff delay in seconds.
    #[serde(default = "default_reconnect_base_delay_secs")]
    pub base_delay_secs: f64,

    /// Ceiling on any single reconnect delay in seconds.
    #[serde(default = "default_reconnect_max_delay_secs")]
    pub max_delay_secs: f64,

    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: default_reconnect_max_retries(),
            base_delay_secs: default_reconnect_base_delay_secs(),
            max_delay_secs: default_reconnect_max_delay_secs(),
            exponential_base: default_exponential_base(),
        }
    }
}

fn default_reconnect_max_retries() -> u32 {
    0
}

fn default_reconnect_base_delay_secs() -> f64 {
    5.0
}

fn default_reconnect_max_delay_secs() -> f64 {
    300.0
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("converge").join("converge.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("converge.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Overflow queue flush configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FlushConfig {
    /// Maximum queued messages replayed per flush pass.
    #[serde(default = "default_flush_batch_size")]
    pub batch_size: usize,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            batch_size: default_flush_batch_size(),
        }
    }
}

fn default_flush_batch_size() -> usize {
    10
}
