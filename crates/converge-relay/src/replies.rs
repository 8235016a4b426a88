// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing fallback strings for the inbound AI path.
//!
//! Every failure mode of [`crate::Relay::handle_inbound`] maps to exactly
//! one of these messages, so platform adapters never see an error from the
//! inbound path -- they always get either a generated reply or a fallback.

/// Reply when the user's daily AI quota is exhausted.
pub fn daily_limit_reached(limit: u64) -> String {
    format!("You have reached your daily AI conversation limit ({limit}). It resets tomorrow.")
}

/// Reply when the system-wide AI request rate is exhausted.
pub const SYSTEM_BUSY: &str =
    "The system is handling a lot of requests right now. Please try again in a moment.";

/// Reply when the AI provider's circuit breaker is open.
pub const AI_UNAVAILABLE: &str =
    "The AI assistant is temporarily unavailable. Please try again later.";

/// Reply when the AI call failed terminally (retries exhausted or a
/// non-retryable upstream error).
pub const GENERATION_FAILED: &str =
    "Sorry, something went wrong while generating a reply. Please try again later.";
