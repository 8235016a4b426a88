// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end relay testing.
//!
//! `TestHarness` assembles a complete relay stack with mock adapters, a
//! temp SQLite database, and a manual clock. Provides `send_inbound()`
//! to drive the full inbound pipeline in tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use converge_config::model::ConvergeConfig;
use converge_core::{ConvergeError, InboundMessage, ManualClock, Platform, UserId};
use converge_relay::Relay;
use converge_storage::Database;

use crate::mock_responder::MockResponder;
use crate::mock_transport::MockTransport;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: ConvergeConfig,
    replies: Vec<String>,
    clock_start: Option<DateTime<Utc>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: ConvergeConfig::default(),
            replies: Vec::new(),
            clock_start: None,
        }
    }

    /// Replace the default configuration.
    pub fn with_config(mut self, config: ConvergeConfig) -> Self {
        self.config = config;
        self
    }

    /// Pre-load the mock responder with replies.
    pub fn with_replies(mut self, replies: Vec<String>) -> Self {
        self.replies = replies;
        self
    }

    /// Start the manual clock at a specific instant.
    pub fn with_clock_start(mut self, start: DateTime<Utc>) -> Self {
        self.clock_start = Some(start);
        self
    }

    /// Build the test harness: temp database, manual clock, mock adapters,
    /// and a fully wired relay.
    pub async fn build(self) -> Result<TestHarness, ConvergeError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| ConvergeError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("converge-test.db");
        let db_path_str = db_path.to_string_lossy().to_string();
        let db = Database::open(&db_path_str, true).await?;

        let responder = Arc::new(if self.replies.is_empty() {
            MockResponder::new()
        } else {
            MockResponder::with_replies(self.replies)
        });
        let transport = Arc::new(MockTransport::new());
        let clock = Arc::new(ManualClock::new(
            self.clock_start.unwrap_or_else(default_clock_start),
        ));

        let relay = Arc::new(
            Relay::new(
                self.config,
                responder.clone(),
                transport.clone(),
                db,
                Vec::new(),
                clock.clone(),
            )
            .await?,
        );

        Ok(TestHarness {
            relay,
            responder,
            transport,
            clock,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
///
/// Provides access to the relay and its mocks for assertions, and a
/// `send_inbound()` method that drives the full inbound pipeline
/// (gate -> quotas -> responder -> history).
pub struct TestHarness {
    /// The relay under test.
    pub relay: Arc<Relay>,
    /// The scripted AI responder.
    pub responder: Arc<MockResponder>,
    /// The capturing outbound transport.
    pub transport: Arc<MockTransport>,
    /// Manual clock shared by every time-aware component.
    pub clock: Arc<ManualClock>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Drive one inbound message through the relay and return the reply,
    /// or `None` when the gate rejected it.
    pub async fn send_inbound(&self, platform: Platform, user: &str, text: &str) -> Option<String> {
        self.relay
            .handle_inbound(InboundMessage {
                platform,
                user_id: UserId::from(user),
                display_name: user.to_string(),
                text: text.to_string(),
            })
            .await
    }
}

/// A fixed, deterministic start instant well inside a quiet part of the
/// month, so tests reason about window rollovers from a known point.
fn default_clock_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .unwrap_or_default()
}
