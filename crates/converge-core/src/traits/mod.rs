// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! The relay core never talks to platform SDKs or AI APIs directly; it is
//! wired to implementations of these seams. All traits use `#[async_trait]`
//! for dynamic dispatch compatibility.

pub mod responder;
pub mod transport;

pub use responder::Responder;
pub use transport::Transport;
