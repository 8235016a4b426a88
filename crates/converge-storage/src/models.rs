// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types returned by the query layer.
//!
//! Timestamps are stored as RFC 3339 TEXT and surfaced as strings here;
//! callers that need `DateTime<Utc>` parse at the boundary.

/// One per-user quota row.
#[derive(Debug, Clone, PartialEq)]
pub struct UserQuotaRow {
    pub user_id: String,
    pub quota_kind: String,
    pub usage_count: u64,
    pub limit_count: u64,
    pub reset_period: String,
    pub last_reset: String,
    pub updated_at: String,
}

/// One shared system-wide quota row (e.g. the provider rate limit).
#[derive(Debug, Clone, PartialEq)]
pub struct SystemQuotaRow {
    pub name: String,
    pub usage_count: u64,
    pub limit_count: u64,
    pub reset_period: String,
    pub last_reset: String,
    pub updated_at: String,
}

/// A message parked in the overflow queue while a delivery quota is
/// exhausted. The platform is stored as its lowercase label; rows with
/// labels no current build understands are skipped at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedMessage {
    pub id: i64,
    pub source_platform: String,
    pub source_display_name: String,
    pub content: String,
    pub status: String,
    pub created_at: String,
}
