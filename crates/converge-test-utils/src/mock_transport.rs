// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform transport for deterministic testing.
//!
//! `MockTransport` implements `Transport` with injectable delivery
//! failures and captured outbound messages for assertion in tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use converge_core::{ConvergeError, OutboundMessage, Transport};

/// A mock platform transport for testing.
///
/// Provides two queues:
/// - **failures**: Messages injected via `fail_next()` make the next
///   `deliver()` calls fail, one failure per call
/// - **sent**: Messages passed to `deliver()` are captured and
///   retrievable via `sent_messages()`
pub struct MockTransport {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    failures: Arc<Mutex<VecDeque<String>>>,
}

impl MockTransport {
    /// Create a new mock transport with empty queues.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Make the next `deliver()` call fail with a channel error.
    ///
    /// Queued failures apply one per call, oldest first.
    pub async fn fail_next(&self, message: impl Into<String>) {
        self.failures.lock().await.push_back(message.into());
    }

    /// Get all messages that were delivered successfully.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().await.clone()
    }

    /// Get the count of delivered messages.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Clear all captured messages.
    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn deliver(&self, msg: OutboundMessage) -> Result<(), ConvergeError> {
        if let Some(message) = self.failures.lock().await.pop_front() {
            return Err(ConvergeError::Channel { message, source: None });
        }
        self.sent.lock().await.push(msg);
        Ok(())
    }
}
