// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Converge workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Platform-scoped user identifier (e.g. a Discord user id or LINE user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        UserId(s.to_string())
    }
}

/// The chat platforms bridged by the relay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Discord,
    Line,
}

/// Who produced a conversation turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One turn of conversation history kept for prompt assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A message arriving from one of the bridged platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub platform: Platform,
    pub user_id: UserId,
    pub display_name: String,
    pub text: String,
}

/// A message to deliver to one of the bridged platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub platform: Platform,
    pub display_name: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn platform_display_and_parse_round_trip() {
        for platform in [Platform::Discord, Platform::Line] {
            let s = platform.to_string();
            let parsed = Platform::from_str(&s).expect("should parse back");
            assert_eq!(platform, parsed);
        }
        assert_eq!(Platform::Line.to_string(), "line");
    }

    #[test]
    fn turn_role_serializes_lowercase() {
        let json = serde_json::to_string(&TurnRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn user_id_display_matches_inner() {
        let id = UserId::from("U12345");
        assert_eq!(id.to_string(), "U12345");
        assert_eq!(id.as_str(), "U12345");
    }

    #[test]
    fn outbound_message_round_trips_through_json() {
        let msg = OutboundMessage {
            platform: Platform::Line,
            display_name: "alice".into(),
            content: "hello".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: OutboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, parsed);
    }
}
