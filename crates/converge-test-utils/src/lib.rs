// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Converge integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockResponder`] - Mock AI responder with scripted replies and failures
//! - [`MockTransport`] - Mock platform transport with delivery capture
//! - [`TestHarness`] - A fully wired relay on a temp database and manual clock
//!
//! [`ManualClock`] is re-exported from `converge-core` so harness users can
//! drive time without a second import.

pub mod harness;
pub mod mock_responder;
pub mod mock_transport;

pub use converge_core::ManualClock;
pub use harness::TestHarness;
pub use mock_responder::{MockResponder, RecordedRequest};
pub use mock_transport::MockTransport;
