// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Converge relay.
//!
//! This crate provides the error taxonomy, the injectable clock, the shared
//! message/identifier types, and the collaborator traits implemented outside
//! the core (AI responder, platform transports).

pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::ConvergeError;
pub use traits::{Responder, Transport};
pub use types::{InboundMessage, OutboundMessage, Platform, Turn, TurnRole, UserId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converge_error_has_all_variants() {
        // Verify all 8 error variants exist and can be constructed.
        let _config = ConvergeError::Config("test".into());
        let _storage = ConvergeError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _channel = ConvergeError::Channel {
            message: "test".into(),
            source: None,
        };
        let _provider = ConvergeError::Provider {
            message: "test".into(),
            source: None,
        };
        let _breaker = ConvergeError::BreakerOpen {
            dependency: "gemini".into(),
        };
        let _exhausted = ConvergeError::RetriesExhausted {
            attempts: 4,
            source: Box::new(ConvergeError::Internal("test".into())),
        };
        let _timeout = ConvergeError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = ConvergeError::Internal("test".into());
    }

    #[test]
    fn collaborator_traits_are_object_safe() {
        // If either trait loses object safety this stops compiling.
        fn _assert_responder(_: &dyn Responder) {}
        fn _assert_transport(_: &dyn Transport) {}
    }
}
