use crate::domain_model::GroupId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub uuid::Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(UserId)
    }
}

/// A verified identity handed over by the identity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub default_privacy: bool,
    pub notifications: bool,
    pub timezone: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            default_privacy: true,
            notifications: true,
            timezone: "UTC".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_logs: u64,
    pub public_logs: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_log_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_log_day: Option<NaiveDate>,
}

impl UserStats {
    /// Streak after logging on `day`: unchanged for the same day, extended
    /// for the following day, restarted otherwise.
    pub fn streak_after(&self, day: NaiveDate) -> (u32, u32) {
        let current = match self.last_log_day {
            Some(last) if last == day => self.current_streak.max(1),
            Some(last) if last.succ_opt() == Some(day) => self.current_streak + 1,
            Some(last) if last > day => self.current_streak.max(1),
            _ => 1,
        };
        (current, self.longest_streak.max(current))
    }
}

/// `users/{userId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    #[serde(default)]
    pub settings: UserSettings,
    #[serde(default)]
    pub stats: UserStats,
    /// Cached projection of the membership records; see `repair_group_references`.
    #[serde(default)]
    pub groups: Vec<GroupId>,
}
