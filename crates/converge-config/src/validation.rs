// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as threshold ranges and backoff parameter sanity.
//! Quota limits are deliberately not validated positive: a limit of 0 is
//! the supported way to shut a resource off while keeping the relay up.

use crate::diagnostic::ConfigError;
use crate::model::ConvergeConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &ConvergeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.relay.log_level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "relay.log_level must be one of {}, got `{}`",
                LOG_LEVELS.join(", "),
                config.relay.log_level
            ),
        });
    }

    check_threshold(
        &mut errors,
        "quota.warning_threshold",
        config.quota.warning_threshold,
    );
    check_threshold(
        &mut errors,
        "conversation.similarity_threshold",
        config.conversation.similarity_threshold,
    );

    if config.conversation.max_history == 0 {
        errors.push(ConfigError::Validation {
            message: "conversation.max_history must be at least 1".to_string(),
        });
    }

    check_backoff(
        &mut errors,
        "retry",
        config.retry.base_delay_secs,
        config.retry.max_delay_secs,
        config.retry.exponential_base,
    );
    check_backoff(
        &mut errors,
        "reconnect",
        config.reconnect.base_delay_secs,
        config.reconnect.max_delay_secs,
        config.reconnect.exponential_base,
    );

    if config.breaker.failure_threshold == 0 {
        errors.push(ConfigError::Validation {
            message: "breaker.failure_threshold must be at least 1".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.flush.batch_size == 0 {
        errors.push(ConfigError::Validation {
            message: "flush.batch_size must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_threshold(errors: &mut Vec<ConfigError>, key: &str, value: f64) {
    if !(value > 0.0 && value <= 1.0) {
        errors.push(ConfigError::Validation {
            message: format!("{key} must be in (0.0, 1.0], got {value}"),
        });
    }
}

fn check_backoff(errors: &mut Vec<ConfigError>, section: &str, base: f64, max: f64, exp: f64) {
    if !(base > 0.0) {
        errors.push(ConfigError::Validation {
            message: format!("{section}.base_delay_secs must be positive, got {base}"),
        });
    }
    if max < base {
        errors.push(ConfigError::Validation {
            message: format!(
                "{section}.max_delay_secs ({max}) must not be below {section}.base_delay_secs ({base})"
            ),
        });
    }
    if !(exp > 1.0) {
        errors.push(ConfigError::Validation {
            message: format!("{section}.exponential_base must be greater than 1, got {exp}"),
        });
    }
}
