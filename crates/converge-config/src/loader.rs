// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./converge.toml` > `~/.config/converge/converge.toml`
//! > `/etc/converge/converge.toml` with environment variable overrides via the
//! `CONVERGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ConvergeConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/converge/converge.toml` (system-wide)
/// 3. `~/.config/converge/converge.toml` (user XDG config)
/// 4. `./converge.toml` (local directory)
/// 5. `CONVERGE_*` environment variables
pub fn load_config() -> Result<ConvergeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConvergeConfig::default()))
        .merge(Toml::file("/etc/converge/converge.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("converge/converge.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("converge.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string layered over the compiled defaults.
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ConvergeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConvergeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ConvergeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ConvergeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores themselves: `CONVERGE_QUOTA_AI_DAILY_LIMIT` must map to
/// `quota.ai_daily_limit`, not `quota.ai.daily.limit`.
fn env_provider() -> Env {
    Env::prefixed("CONVERGE_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped,
        // e.g. CONVERGE_QUOTA_AI_DAILY_LIMIT -> "quota_ai_daily_limit".
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("relay_", "relay.", 1)
            .replacen("quota_", "quota.", 1)
            .replacen("conversation_", "conversation.", 1)
            .replacen("retry_", "retry.", 1)
            .replacen("breaker_", "breaker.", 1)
            .replacen("reconnect_", "reconnect.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("flush_", "flush.", 1);
        mapped.into()
    })
}
