// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Converge configuration system.

use converge_config::diagnostic::{suggest_key, ConfigError};
use converge_config::model::ConvergeConfig;
use converge_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_converge_config() {
    let toml = r#"
[relay]
name = "test-relay"
log_level = "debug"

[quota]
ai_daily_limit = 10
ai_requests_per_minute = 15
line_monthly_limit = 200
warning_threshold = 0.8

[conversation]
timeout_secs = 600
max_history = 6
similarity_threshold = 0.9
max_length_diff = 3
cooldown_secs = 30

[retry]
max_retries = 2
base_delay_secs = 0.5
max_delay_secs = 30.0
exponential_base = 3.0

[breaker]
failure_threshold = 4
recovery_timeout_secs = 90

[reconnect]
max_retries = 5
base_delay_secs = 2.0
max_delay_secs = 120.0

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[flush]
batch_size = 25
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.relay.name, "test-relay");
    assert_eq!(config.relay.log_level, "debug");
    assert_eq!(config.quota.ai_daily_limit, 10);
    assert_eq!(config.quota.ai_requests_per_minute, 15);
    assert_eq!(config.quota.line_monthly_limit, 200);
    assert_eq!(config.quota.warning_threshold, 0.8);
    assert_eq!(config.conversation.timeout_secs, 600);
    assert_eq!(config.conversation.max_history, 6);
    assert_eq!(config.conversation.similarity_threshold, 0.9);
    assert_eq!(config.conversation.max_length_diff, 3);
    assert_eq!(config.conversation.cooldown_secs, 30);
    assert_eq!(config.retry.max_retries, 2);
    assert_eq!(config.retry.base_delay_secs, 0.5);
    assert_eq!(config.retry.max_delay_secs, 30.0);
    assert_eq!(config.retry.exponential_base, 3.0);
    assert_eq!(config.breaker.failure_threshold, 4);
    assert_eq!(config.breaker.recovery_timeout_secs, 90);
    assert_eq!(config.reconnect.max_retries, 5);
    assert_eq!(config.reconnect.base_delay_secs, 2.0);
    assert_eq!(config.reconnect.max_delay_secs, 120.0);
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.flush.batch_size, 25);
}

/// Unknown field in [quota] section is rejected.
#[test]
fn unknown_field_in_quota_produces_error() {
    let toml = r#"
[quota]
ai_dialy_limit = 20
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("ai_dialy_limit"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Missing optional sections use the shipped defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let toml = "";
    let config = load_config_from_str(toml).expect("empty TOML should use defaults");

    assert_eq!(config.relay.name, "converge");
    assert_eq!(config.relay.log_level, "info");
    assert_eq!(config.quota.ai_daily_limit, 20);
    assert_eq!(config.quota.ai_requests_per_minute, 30);
    assert_eq!(config.quota.line_monthly_limit, 500);
    assert_eq!(config.quota.warning_threshold, 0.9);
    assert_eq!(config.conversation.timeout_secs, 1800);
    assert_eq!(config.conversation.max_history, 10);
    assert_eq!(config.conversation.similarity_threshold, 0.8);
    assert_eq!(config.conversation.max_length_diff, 5);
    assert_eq!(config.conversation.cooldown_secs, 60);
    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.retry.base_delay_secs, 1.0);
    assert_eq!(config.retry.max_delay_secs, 60.0);
    assert_eq!(config.retry.exponential_base, 2.0);
    assert_eq!(config.breaker.failure_threshold, 5);
    assert_eq!(config.breaker.recovery_timeout_secs, 60);
    assert_eq!(config.reconnect.max_retries, 0, "reconnect retries forever by default");
    assert_eq!(config.reconnect.base_delay_secs, 5.0);
    assert_eq!(config.reconnect.max_delay_secs, 300.0);
    assert!(config.storage.wal_mode);
    assert_eq!(config.flush.batch_size, 10);
}

/// Dot-notation merge (the shape env vars take) overrides TOML values.
#[test]
fn dotted_override_beats_toml_value() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[quota]
ai_daily_limit = 20
"#;

    let config: ConvergeConfig = Figment::new()
        .merge(Serialized::defaults(ConvergeConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("quota.ai_daily_limit", 7u64))
        .extract()
        .expect("should merge override");

    assert_eq!(config.quota.ai_daily_limit, 7);
}

/// Underscore-containing keys map via dot notation to the right field
/// (quota.ai_daily_limit, never quota.ai.daily.limit).
#[test]
fn dotted_override_reaches_underscore_key() {
    use figment::{providers::Serialized, Figment};

    let config: ConvergeConfig = Figment::new()
        .merge(Serialized::defaults(ConvergeConfig::default()))
        .merge(("conversation.similarity_threshold", 0.95))
        .extract()
        .expect("should set nested key via dot notation");

    assert_eq!(config.conversation.similarity_threshold, 0.95);
}

/// Missing config files are silently skipped (Figment's Toml::file() behavior).
#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: ConvergeConfig = Figment::new()
        .merge(Serialized::defaults(ConvergeConfig::default()))
        .merge(Toml::file("/nonexistent/path/converge.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.relay.name, "converge");
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[throttling]
limit = 10
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("throttling"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Unknown key errors carry a fuzzy suggestion and the valid key list.
#[test]
fn diagnostic_error_includes_suggestion_and_valid_keys() {
    let toml = r#"
[conversation]
similarity_treshold = 0.9
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    assert!(!errors.is_empty(), "should have at least one error");

    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "similarity_treshold"
                && suggestion.as_deref() == Some("similarity_threshold")
                && valid_keys.contains("max_history")
        })
    });
    assert!(
        has_unknown_key,
        "should suggest `similarity_threshold` and list section keys, got: {errors:?}"
    );
}

/// Invalid type (string where number expected) produces a clear message.
#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[breaker]
failure_threshold = "lots"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("failure_threshold"),
        "error should mention type mismatch, got: {err_str}"
    );
}

/// ConfigError implements miette::Diagnostic with code and help text.
#[test]
fn config_error_implements_diagnostic() {
    use miette::Diagnostic;

    let error = ConfigError::UnknownKey {
        key: "batch_szie".to_string(),
        suggestion: Some("batch_size".to_string()),
        valid_keys: "batch_size".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some(), "should have diagnostic code");

    let help = error.help().expect("should have help text").to_string();
    assert!(
        help.contains("did you mean `batch_size`"),
        "help should contain suggestion, got: {help}"
    );
}

/// ConfigError can be rendered using miette's graphical handler.
#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let error = ConfigError::UnknownKey {
        key: "batch_szie".to_string(),
        suggestion: Some("batch_size".to_string()),
        valid_keys: "batch_size".to_string(),
        span: None,
        src: None,
    };

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(!buf.is_empty(), "rendered report should not be empty");
    assert!(buf.contains("batch_szie"), "rendered report should mention the key");
}

/// load_and_validate_str with valid TOML returns Ok config.
#[test]
fn load_and_validate_valid_toml() {
    let toml = r#"
[relay]
name = "bridge-a"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert_eq!(config.relay.name, "bridge-a");
}

/// Validation catches an out-of-range warning threshold after deserialization.
#[test]
fn validation_catches_out_of_range_threshold() {
    let toml = r#"
[quota]
warning_threshold = 2.0
"#;

    let errors = load_and_validate_str(toml).expect_err("threshold above 1.0 should fail");
    let has_validation_error = errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("warning_threshold"))
    });
    assert!(has_validation_error, "should have validation error, got: {errors:?}");
}

/// suggest_key works over this crate's real key names.
#[test]
fn diagnostic_suggests_for_relay_keys() {
    let valid_keys = &["name", "log_level"];
    assert_eq!(suggest_key("log_levl", valid_keys), Some("log_level".to_string()));
    assert!(suggest_key("xyzzy", valid_keys).is_none());
}
