// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for per-user and system-wide quota counters.
//!
//! Rows are keyed on (user_id, quota_kind, reset_period) so a config change
//! that moves a quota to a different window starts a fresh row instead of
//! inheriting stale usage. Reads take the most recently updated row.

use converge_core::ConvergeError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{SystemQuotaRow, UserQuotaRow};

/// Fetch the current quota row for a user, if one exists.
pub async fn get_user_quota(
    db: &Database,
    user_id: &str,
    quota_kind: &str,
) -> Result<Option<UserQuotaRow>, ConvergeError> {
    let user_id = user_id.to_string();
    let quota_kind = quota_kind.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT user_id, quota_kind, usage_count, limit_count,
                        reset_period, last_reset, updated_at
                 FROM quotas
                 WHERE user_id = ?1 AND quota_kind = ?2
                 ORDER BY updated_at DESC
                 LIMIT 1",
                params![user_id, quota_kind],
                |row| {
                    Ok(UserQuotaRow {
                        user_id: row.get(0)?,
                        quota_kind: row.get(1)?,
                        usage_count: row.get(2)?,
                        limit_count: row.get(3)?,
                        reset_period: row.get(4)?,
                        last_reset: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                },
            );
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or update a user quota row.
///
/// Conflicts on (user_id, quota_kind, reset_period) overwrite usage, limit,
/// and both timestamps.
pub async fn upsert_user_quota(db: &Database, row: &UserQuotaRow) -> Result<(), ConvergeError> {
    let row = row.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO quotas
                     (user_id, quota_kind, usage_count, limit_count,
                      reset_period, last_reset, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(user_id, quota_kind, reset_period) DO UPDATE SET
                     usage_count = excluded.usage_count,
                     limit_count = excluded.limit_count,
                     last_reset = excluded.last_reset,
                     updated_at = excluded.updated_at",
                params![
                    row.user_id,
                    row.quota_kind,
                    row.usage_count,
                    row.limit_count,
                    row.reset_period,
                    row.last_reset,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All user rows for one quota kind, most recently updated first.
pub async fn list_user_quotas(
    db: &Database,
    quota_kind: &str,
) -> Result<Vec<UserQuotaRow>, ConvergeError> {
    let quota_kind = quota_kind.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, quota_kind, usage_count, limit_count,
                        reset_period, last_reset, updated_at
                 FROM quotas
                 WHERE quota_kind = ?1
                 ORDER BY updated_at DESC",
            )?;
            let rows = stmt
                .query_map(params![quota_kind], |row| {
                    Ok(UserQuotaRow {
                        user_id: row.get(0)?,
                        quota_kind: row.get(1)?,
                        usage_count: row.get(2)?,
                        limit_count: row.get(3)?,
                        reset_period: row.get(4)?,
                        last_reset: row.get(5)?,
                        updated_at: row.get(6)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Fetch a shared system quota by name.
pub async fn get_system_quota(
    db: &Database,
    name: &str,
) -> Result<Option<SystemQuotaRow>, ConvergeError> {
    let name = name.to_string();
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT name, usage_count, limit_count, reset_period,
                        last_reset, updated_at
                 FROM system_quotas
                 WHERE name = ?1",
                params![name],
                |row| {
                    Ok(SystemQuotaRow {
                        name: row.get(0)?,
                        usage_count: row.get(1)?,
                        limit_count: row.get(2)?,
                        reset_period: row.get(3)?,
                        last_reset: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            );
            match result {
                Ok(row) => Ok(Some(row)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Insert or update a system quota row, keyed on its name.
pub async fn upsert_system_quota(db: &Database, row: &SystemQuotaRow) -> Result<(), ConvergeError> {
    let row = row.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO system_quotas
                     (name, usage_count, limit_count, reset_period, last_reset, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(name) DO UPDATE SET
                     usage_count = excluded.usage_count,
                     limit_count = excluded.limit_count,
                     reset_period = excluded.reset_period,
                     last_reset = excluded.last_reset,
                     updated_at = excluded.updated_at",
                params![
                    row.name,
                    row.usage_count,
                    row.limit_count,
                    row.reset_period,
                    row.last_reset,
                    row.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    fn daily_row(user_id: &str, usage: u64, updated_at: &str) -> UserQuotaRow {
        UserQuotaRow {
            user_id: user_id.to_string(),
            quota_kind: "ai_daily".to_string(),
            usage_count: usage,
            limit_count: 20,
            reset_period: "daily".to_string(),
            last_reset: "2026-03-01T00:00:00Z".to_string(),
            updated_at: updated_at.to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trip() {
        let (db, _dir) = setup_db().await;

        let row = daily_row("alice", 3, "2026-03-01T09:00:00Z");
        upsert_user_quota(&db, &row).await.unwrap();

        let fetched = get_user_quota(&db, "alice", "ai_daily").await.unwrap();
        assert_eq!(fetched, Some(row));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_user_returns_none() {
        let (db, _dir) = setup_db().await;
        let fetched = get_user_quota(&db, "nobody", "ai_daily").await.unwrap();
        assert!(fetched.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_overwrites_matching_row() {
        let (db, _dir) = setup_db().await;

        upsert_user_quota(&db, &daily_row("alice", 3, "2026-03-01T09:00:00Z"))
            .await
            .unwrap();
        upsert_user_quota(&db, &daily_row("alice", 4, "2026-03-01T09:05:00Z"))
            .await
            .unwrap();

        let fetched = get_user_quota(&db, "alice", "ai_daily").await.unwrap().unwrap();
        assert_eq!(fetched.usage_count, 4);

        // Still a single row, not two.
        let count: i64 = db
            .connection()
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM quotas", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn period_change_reads_newest_row() {
        let (db, _dir) = setup_db().await;

        upsert_user_quota(&db, &daily_row("alice", 19, "2026-03-01T09:00:00Z"))
            .await
            .unwrap();
        let mut weekly = daily_row("alice", 0, "2026-03-02T09:00:00Z");
        weekly.reset_period = "weekly".to_string();
        upsert_user_quota(&db, &weekly).await.unwrap();

        let fetched = get_user_quota(&db, "alice", "ai_daily").await.unwrap().unwrap();
        assert_eq!(fetched.reset_period, "weekly");
        assert_eq!(fetched.usage_count, 0);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_filters_by_kind() {
        let (db, _dir) = setup_db().await;

        upsert_user_quota(&db, &daily_row("alice", 1, "2026-03-01T09:00:00Z"))
            .await
            .unwrap();
        upsert_user_quota(&db, &daily_row("bob", 2, "2026-03-01T09:01:00Z"))
            .await
            .unwrap();
        let mut other = daily_row("carol", 5, "2026-03-01T09:02:00Z");
        other.quota_kind = "uploads".to_string();
        upsert_user_quota(&db, &other).await.unwrap();

        let rows = list_user_quotas(&db, "ai_daily").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, "bob");
        assert_eq!(rows[1].user_id, "alice");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn migration_seeds_system_quotas() {
        let (db, _dir) = setup_db().await;

        let rpm = get_system_quota(&db, "gemini_rpm").await.unwrap().unwrap();
        assert_eq!(rpm.usage_count, 0);
        assert_eq!(rpm.limit_count, 30);
        assert_eq!(rpm.reset_period, "minute");

        let monthly = get_system_quota(&db, "line_monthly").await.unwrap().unwrap();
        assert_eq!(monthly.limit_count, 500);
        assert_eq!(monthly.reset_period, "monthly");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn upsert_system_quota_overwrites_seed() {
        let (db, _dir) = setup_db().await;

        let row = SystemQuotaRow {
            name: "gemini_rpm".to_string(),
            usage_count: 12,
            limit_count: 60,
            reset_period: "minute".to_string(),
            last_reset: "2026-03-01T09:00:00Z".to_string(),
            updated_at: "2026-03-01T09:00:30Z".to_string(),
        };
        upsert_system_quota(&db, &row).await.unwrap();

        let fetched = get_system_quota(&db, "gemini_rpm").await.unwrap();
        assert_eq!(fetched, Some(row));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_system_quota_returns_none() {
        let (db, _dir) = setup_db().await;
        let fetched = get_system_quota(&db, "unheard_of").await.unwrap();
        assert!(fetched.is_none());
        db.close().await.unwrap();
    }
}
