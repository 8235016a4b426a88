// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation gating for the Converge relay.
//!
//! Every inbound message passes through [`ConversationGate::admit`] before
//! any quota is consulted or any AI call is made. The gate enforces, in
//! order: one in-flight message per user, near-duplicate suppression
//! against the user's previous message, and a system-wide request-rate
//! throttle over a rolling window. It also owns each user's bounded
//! conversation history with lazy idle expiry.

pub mod gate;
pub mod similarity;

pub use gate::{ConversationGate, GateDecision};
