// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Converge relay core.

use thiserror::Error;

/// The primary error type used across all Converge crates.
///
/// Quota exhaustion is deliberately absent: running out of quota is an
/// expected outcome reported through boolean results, never an error.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Configuration errors (invalid TOML, bad values, unknown keys).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database open, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Platform channel errors (send failure, malformed payload, disconnect).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// AI provider errors (API failure, bad response, token limits).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A circuit breaker rejected the call without attempting it.
    #[error("circuit breaker open for {dependency}")]
    BreakerOpen { dependency: String },

    /// A retried operation failed on every attempt; `source` is the last error.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: Box<ConvergeError>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvergeError {
    /// Whether a retry layer should attempt this operation again.
    ///
    /// Upstream call failures (provider, channel, timeout) are transient.
    /// `BreakerOpen` is non-retryable: sleeping against an open breaker
    /// burns the retry budget for nothing. `RetriesExhausted` is terminal
    /// by definition, and config/storage/internal errors will not improve
    /// on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConvergeError::Provider { .. }
                | ConvergeError::Channel { .. }
                | ConvergeError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_and_channel_errors_are_retryable() {
        let provider = ConvergeError::Provider {
            message: "upstream 503".into(),
            source: None,
        };
        let channel = ConvergeError::Channel {
            message: "send failed".into(),
            source: None,
        };
        let timeout = ConvergeError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        assert!(provider.is_retryable());
        assert!(channel.is_retryable());
        assert!(timeout.is_retryable());
    }

    #[test]
    fn breaker_open_is_not_retryable() {
        let err = ConvergeError::BreakerOpen {
            dependency: "gemini".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn retries_exhausted_is_terminal() {
        let err = ConvergeError::RetriesExhausted {
            attempts: 4,
            source: Box::new(ConvergeError::Provider {
                message: "upstream 503".into(),
                source: None,
            }),
        };
        assert!(!err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains("4 attempts"));
        assert!(msg.contains("upstream 503"));
    }

    #[test]
    fn config_and_internal_are_not_retryable() {
        assert!(!ConvergeError::Config("bad period".into()).is_retryable());
        assert!(!ConvergeError::Internal("oops".into()).is_retryable());
        let storage = ConvergeError::Storage {
            source: Box::new(std::io::Error::other("disk")),
        };
        assert!(!storage.is_retryable());
    }
}
