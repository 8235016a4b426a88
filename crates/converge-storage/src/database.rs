// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All access is serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use converge_core::ConvergeError;

use crate::migrations;

/// Handle to the relay's SQLite database.
///
/// Cloning the inner connection is cheap; every clone talks to the same
/// background thread.
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, configure pragmas, and run
    /// any pending migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, ConvergeError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_tr_err)?;

        conn.call(move |conn| {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))?;
            migrations::run_migrations(conn)
                .map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        Ok(Self { conn })
    }

    /// The shared async connection handle.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Close the background connection, flushing WAL state.
    pub async fn close(self) -> Result<(), ConvergeError> {
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// Map a tokio-rusqlite error into the workspace storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> ConvergeError {
    ConvergeError::Storage {
        source: Box::new(e),
    }
}
