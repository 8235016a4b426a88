// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quota counters and the registry that owns them.
//!
//! Three scarce resources are accounted here: per-user daily AI
//! generations (`ai_daily:<user>`), system-wide AI requests per minute
//! (`gemini_rpm`), and the monthly send allowance on the bridged platform
//! (`line_monthly`). Quota exhaustion is never an error: every consuming
//! operation reports a boolean and callers branch on it.

pub mod counter;
pub mod registry;

pub use counter::{QuotaCounter, ResetPeriod};
pub use registry::{QuotaRegistry, QuotaSnapshot};

/// Well-known quota names shared between the relay and its collaborators.
pub mod names {
    use converge_core::UserId;

    /// System-wide AI requests-per-minute quota.
    pub const GEMINI_RPM: &str = "gemini_rpm";

    /// System-wide monthly send quota on the bridged platform.
    pub const LINE_MONTHLY: &str = "line_monthly";

    /// Prefix for per-user daily AI quotas.
    pub const AI_DAILY_PREFIX: &str = "ai_daily:";

    /// Storage kind label for per-user daily AI quotas. Registry names are
    /// `AI_DAILY_PREFIX` + user id; persisted rows carry this kind plus the
    /// user id in their own column.
    pub const AI_DAILY_KIND: &str = "ai_daily";

    /// The per-user daily AI quota name for `user_id`.
    pub fn ai_daily(user_id: &UserId) -> String {
        format!("{AI_DAILY_PREFIX}{user_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_core::UserId;

    #[test]
    fn ai_daily_name_includes_user_id() {
        let user = UserId::from("U123");
        assert_eq!(names::ai_daily(&user), "ai_daily:U123");
        assert!(names::ai_daily(&user).starts_with(names::AI_DAILY_PREFIX));
    }

    #[test]
    fn ai_daily_prefix_is_kind_plus_separator() {
        assert_eq!(format!("{}:", names::AI_DAILY_KIND), names::AI_DAILY_PREFIX);
    }
}
