use crate::domain_model::{InviteCode, UserId, UserStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

pub const MIN_GROUP_SIZE: u32 = 2;
pub const MAX_GROUP_SIZE: u32 = 100;
pub const DEFAULT_GROUP_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub uuid::Uuid);

impl GroupId {
    pub fn new_v4() -> Self {
        GroupId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GroupId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(GroupId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSettings {
    pub max_members: u32,
    pub is_private: bool,
    pub allow_self_join: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub member_count: u32,
    pub total_logs: u64,
    pub last_activity: DateTime<Utc>,
}

/// `groups/{groupId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub invite_code: InviteCode,
    pub settings: GroupSettings,
    pub stats: GroupStats,
    pub member_ids: Vec<UserId>,
}

impl Group {
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member_ids.contains(&user_id)
    }

    pub fn is_full(&self) -> bool {
        self.stats.member_count >= self.settings.max_members
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupMemberRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStats {
    pub total_logs: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl From<&UserStats> for MemberStats {
    /// Only public logs count towards group standings.
    fn from(stats: &UserStats) -> Self {
        MemberStats {
            total_logs: stats.public_logs,
            current_streak: stats.current_streak,
            longest_streak: stats.longest_streak,
        }
    }
}

/// `groups/{groupId}/members/{userId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: UserId,
    pub display_name: String,
    pub role: GroupMemberRole,
    pub joined_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub stats: MemberStats,
}

fn default_allow_self_join() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    #[validate(length(min = 1, max = 50, message = "group name must be 1-50 characters"))]
    pub name: String,
    #[validate(length(max = 200, message = "description must be 200 characters or less"))]
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default = "default_allow_self_join")]
    pub allow_self_join: bool,
    /// Falls back to the configured default when absent.
    #[validate(range(min = 2, max = 100, message = "max members must be between 2 and 100"))]
    #[serde(default)]
    pub max_members: Option<u32>,
}

impl NewGroup {
    pub fn named(name: impl Into<String>) -> Self {
        NewGroup {
            name: name.into(),
            description: None,
            is_private: false,
            allow_self_join: true,
            max_members: None,
        }
    }

    pub fn with_max_members(mut self, max_members: u32) -> Self {
        self.max_members = Some(max_members);
        self
    }

    pub fn settings(&self, default_max_members: u32) -> GroupSettings {
        GroupSettings {
            max_members: self
                .max_members
                .unwrap_or(default_max_members)
                .clamp(MIN_GROUP_SIZE, MAX_GROUP_SIZE),
            is_private: self.is_private,
            allow_self_join: self.allow_self_join,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_group_bounds() {
        assert!(NewGroup::named("Streakers").validate().is_ok());
        assert!(NewGroup::named("").validate().is_err());
        assert!(NewGroup::named("x".repeat(51)).validate().is_err());
        assert!(NewGroup::named("ok").with_max_members(1).validate().is_err());
        assert!(NewGroup::named("ok").with_max_members(2).validate().is_ok());
        assert!(NewGroup::named("ok").with_max_members(100).validate().is_ok());
        assert!(NewGroup::named("ok").with_max_members(101).validate().is_err());

        let mut long_description = NewGroup::named("ok");
        long_description.description = Some("d".repeat(201));
        assert!(long_description.validate().is_err());
    }

    #[test]
    fn new_group_defaults_from_json() {
        let group: NewGroup = serde_json::from_str(r#"{"name":"Streakers"}"#).unwrap();
        assert_eq!(group.max_members, None);
        assert_eq!(group.settings(DEFAULT_GROUP_SIZE).max_members, DEFAULT_GROUP_SIZE);
        assert!(group.allow_self_join);
        assert!(!group.is_private);
    }

    #[test]
    fn member_stats_snapshot_uses_public_logs() {
        let stats = UserStats {
            total_logs: 10,
            public_logs: 4,
            current_streak: 2,
            longest_streak: 7,
            ..Default::default()
        };
        assert_eq!(
            MemberStats::from(&stats),
            MemberStats {
                total_logs: 4,
                current_streak: 2,
                longest_streak: 7
            }
        );
    }
}
