// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `converge queue` command implementation.
//!
//! Lists the oldest pending messages in the overflow queue, oldest first,
//! in the order a flush pass would replay them.

use tracing::debug;

use converge_config::model::ConvergeConfig;
use converge_core::ConvergeError;
use converge_storage::models::QueuedMessage;
use converge_storage::{queries, Database};

/// Run the `converge queue list` command.
pub async fn run_list(config: &ConvergeConfig, limit: u32) -> Result<(), ConvergeError> {
    debug!(path = %config.storage.database_path, "opening database for queue list");
    let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;
    let pending = queries::queue::peek_oldest(&db, limit).await?;
    let depth = queries::queue::queue_depth(&db).await?;
    db.close().await?;

    if pending.is_empty() {
        println!("overflow queue is empty");
        return Ok(());
    }

    println!("{depth} message(s) queued, showing oldest {}:", pending.len());
    for row in &pending {
        println!("  {}", format_row(row));
    }
    Ok(())
}

/// One queue entry as a single scannable line.
fn format_row(row: &QueuedMessage) -> String {
    format!(
        "#{:<5} {}  {:<8} {}: {}",
        row.id, row.created_at, row.source_platform, row.source_display_name, row.content
    )
}
