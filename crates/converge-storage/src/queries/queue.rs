// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Overflow queue operations.
//!
//! Messages land here when the delivery quota for their destination is
//! exhausted. Entries only move one way, from 'queued' to 'sent'; a drain
//! pass peeks the oldest entries, attempts delivery, and marks the ones
//! that actually went out.

use converge_core::ConvergeError;
use rusqlite::params;

use crate::database::Database;
use crate::models::QueuedMessage;

/// Park a message in the overflow queue. Returns the auto-generated row ID.
pub async fn enqueue(
    db: &Database,
    source_platform: &str,
    source_display_name: &str,
    content: &str,
) -> Result<i64, ConvergeError> {
    let source_platform = source_platform.to_string();
    let source_display_name = source_display_name.to_string();
    let content = content.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO queued_messages (source_platform, source_display_name, content)
                 VALUES (?1, ?2, ?3)",
                params![source_platform, source_display_name, content],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The oldest still-queued messages, in arrival order, up to `limit`.
///
/// Does not change any row state; callers follow up with [`mark_sent`]
/// for the entries they managed to deliver.
pub async fn peek_oldest(db: &Database, limit: u32) -> Result<Vec<QueuedMessage>, ConvergeError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, source_platform, source_display_name, content, status, created_at
                 FROM queued_messages
                 WHERE status = 'queued'
                 ORDER BY id ASC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![limit], |row| {
                    Ok(QueuedMessage {
                        id: row.get(0)?,
                        source_platform: row.get(1)?,
                        source_display_name: row.get(2)?,
                        content: row.get(3)?,
                        status: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark delivered messages as sent. Returns how many rows transitioned.
///
/// IDs that do not exist, or that were already sent, are silently skipped;
/// the guard on status keeps the transition one-directional.
pub async fn mark_sent(db: &Database, ids: &[i64]) -> Result<u64, ConvergeError> {
    let ids = ids.to_vec();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let mut transitioned = 0u64;
            for id in ids {
                let changed = tx.execute(
                    "UPDATE queued_messages
                     SET status = 'sent',
                         sent_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                     WHERE id = ?1 AND status = 'queued'",
                    params![id],
                )?;
                transitioned += changed as u64;
            }
            tx.commit()?;
            Ok(transitioned)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Number of messages still waiting to go out.
pub async fn queue_depth(db: &Database) -> Result<u64, ConvergeError> {
    db.connection()
        .call(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM queued_messages WHERE status = 'queued'",
                [],
                |row| row.get(0),
            )?)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
