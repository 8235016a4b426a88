// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `converge status` command implementation.
//!
//! Reads quota standing and queue depth straight from the database, so it
//! reports persisted state whether or not a relay process is running.
//! If `--json` is passed, outputs structured JSON for scripting.

use std::io::IsTerminal;

use serde::Serialize;
use tracing::debug;

use converge_config::model::ConvergeConfig;
use converge_core::ConvergeError;
use converge_quota::names;
use converge_storage::{queries, Database};

/// One quota counter line in the status output.
#[derive(Debug, Serialize)]
pub struct QuotaStatus {
    pub name: String,
    pub usage_count: u64,
    pub limit_count: u64,
    pub usage_percentage: f64,
    pub reset_period: String,
}

/// One per-user daily counter in the status output.
#[derive(Debug, Serialize)]
pub struct UserQuotaStatus {
    pub user_id: String,
    pub usage_count: u64,
    pub limit_count: u64,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub database_path: String,
    pub system_quotas: Vec<QuotaStatus>,
    pub user_daily_quotas: Vec<UserQuotaStatus>,
    pub queue_depth: u64,
}

/// Run the `converge status` command.
pub async fn run_status(
    config: &ConvergeConfig,
    json: bool,
    plain: bool,
) -> Result<(), ConvergeError> {
    debug!(path = %config.storage.database_path, "opening database for status");
    let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;

    let mut system_quotas = Vec::new();
    for name in [names::GEMINI_RPM, names::LINE_MONTHLY] {
        if let Some(row) = queries::quotas::get_system_quota(&db, name).await? {
            system_quotas.push(QuotaStatus {
                usage_percentage: percentage(row.usage_count, row.limit_count),
                name: row.name,
                usage_count: row.usage_count,
                limit_count: row.limit_count,
                reset_period: row.reset_period,
            });
        }
    }

    let user_daily_quotas = queries::quotas::list_user_quotas(&db, names::AI_DAILY_KIND)
        .await?
        .into_iter()
        .map(|row| UserQuotaStatus {
            user_id: row.user_id,
            usage_count: row.usage_count,
            limit_count: row.limit_count,
        })
        .collect();

    let queue_depth = queries::queue::queue_depth(&db).await?;
    db.close().await?;

    let response = StatusResponse {
        database_path: config.storage.database_path.clone(),
        system_quotas,
        user_daily_quotas,
        queue_depth,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_status(&response, use_color);
    }

    Ok(())
}

/// Usage as a percentage of the limit; 0 when the limit is 0, matching the
/// in-memory counters.
fn percentage(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        0.0
    } else {
        100.0 * usage as f64 / limit as f64
    }
}

/// Print human-readable status with optional colors.
fn print_status(resp: &StatusResponse, use_color: bool) {
    println!();
    println!("  converge status");
    println!("  {}", "-".repeat(35));
    println!("    Database: {}", resp.database_path);
    println!();

    println!("    System quotas:");
    if resp.system_quotas.is_empty() {
        println!("      (none recorded yet)");
    }
    for quota in &resp.system_quotas {
        let line = format!(
            "{:<14} {:>5}/{:<5} ({:>3.0}%, {})",
            quota.name,
            quota.usage_count,
            quota.limit_count,
            quota.usage_percentage,
            quota.reset_period
        );
        if use_color {
            use colored::Colorize;
            let colored_line = if quota.usage_count >= quota.limit_count {
                line.red()
            } else if quota.usage_percentage >= 90.0 {
                line.yellow()
            } else {
                line.green()
            };
            println!("      {colored_line}");
        } else {
            println!("      {line}");
        }
    }
    println!();

    let tracked_users = resp.user_daily_quotas.len();
    let daily_total: u64 = resp.user_daily_quotas.iter().map(|u| u.usage_count).sum();
    println!("    Daily AI usage: {daily_total} request(s) across {tracked_users} user(s)");

    if use_color && resp.queue_depth > 0 {
        use colored::Colorize;
        println!(
            "    Queue depth:    {}",
            format!("{} waiting", resp.queue_depth).yellow()
        );
    } else {
        println!("    Queue depth:    {}", resp.queue_depth);
    }
    println!();
}
