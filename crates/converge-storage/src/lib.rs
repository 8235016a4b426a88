// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Converge relay.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for quota
//! counters and the overflow message queue.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::*;
