// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for calls that leave the process.
//!
//! Three mechanisms cover the relay's failure modes:
//!
//! - [`RetryPolicy`] re-runs a transient-failing call with exponential
//!   backoff, so one flaky request does not surface to the user.
//! - [`CircuitBreaker`] stops hammering a dependency that keeps failing
//!   and probes it with a single trial call once a recovery timeout has
//!   passed.
//! - [`ReconnectSupervisor`] re-establishes long-lived connections,
//!   by default retrying forever.
//!
//! All three report failures through [`converge_core::ConvergeError`];
//! retries that run out wrap the last error in
//! [`converge_core::ConvergeError::RetriesExhausted`] so callers can
//! tell a terminal failure from a transient one.

mod breaker;
mod reconnect;
mod retry;

pub use breaker::{BreakerState, CircuitBreaker};
pub use reconnect::ReconnectSupervisor;
pub use retry::RetryPolicy;
