// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Responder trait for the AI provider integration (Gemini, etc.).

use async_trait::async_trait;

use crate::error::ConvergeError;
use crate::types::{Turn, UserId};

/// Adapter for the AI provider that generates conversational replies.
///
/// Implementations are expected to be slow and occasionally flaky; callers
/// wrap invocations in the retry and circuit-breaker layers.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Generates a reply to `text` given the user's recent history.
    async fn generate(
        &self,
        user_id: &UserId,
        history: &[Turn],
        text: &str,
    ) -> Result<String, ConvergeError>;
}
