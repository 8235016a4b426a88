// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport trait for outbound delivery to a bridged platform.

use async_trait::async_trait;

use crate::error::ConvergeError;
use crate::types::OutboundMessage;

/// Adapter for delivering messages to a chat platform.
///
/// One implementation exists per platform send API. Delivery is not
/// exactly-once: a failed `deliver` may or may not have reached the
/// platform, and callers decide whether to requeue.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers a single message to the platform.
    async fn deliver(&self, msg: OutboundMessage) -> Result<(), ConvergeError>;
}
