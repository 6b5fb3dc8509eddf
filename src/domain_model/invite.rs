use crate::domain_model::{Group, GroupId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_INVITE_CODE_LENGTH: usize = 20;

/// Case-insensitive invite token, stored uppercase. Also the document key
/// under `inviteCodes/`.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    /// Normalizes user input. `None` for anything that can never name a code.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.len() > MAX_INVITE_CODE_LENGTH
            || !trimmed.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return None;
        }
        Some(InviteCode(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteCodeStatus {
    /// The group's current code.
    Active,
    /// Replaced by a rotation.
    Superseded,
    /// Its group was deleted.
    Revoked,
}

/// `inviteCodes/{code}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCodeRecord {
    pub code: InviteCode,
    pub group_id: GroupId,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    pub current_uses: u32,
    pub status: InviteCodeStatus,
    /// Mirrors `status == Active` for readers that only check a flag.
    #[serde(rename = "isActive", default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteValidity {
    Valid,
    Inactive,
    Expired,
    Exhausted,
}

impl InviteCodeRecord {
    pub fn new(code: InviteCode, group_id: GroupId, options: &InviteCodeOptions, now: DateTime<Utc>) -> Self {
        InviteCodeRecord {
            code,
            group_id,
            created_at: now,
            expires_at: options.expires_at,
            max_uses: options.max_uses,
            current_uses: 0,
            status: InviteCodeStatus::Active,
            active: true,
            deactivated_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == InviteCodeStatus::Active
    }

    pub fn is_use_limited(&self) -> bool {
        matches!(self.max_uses, Some(max) if max > 0)
    }

    /// Checks in join order: active, then expiry, then use limit.
    pub fn validity(&self, now: DateTime<Utc>) -> InviteValidity {
        if !self.is_active() {
            return InviteValidity::Inactive;
        }
        if matches!(self.expires_at, Some(expires_at) if expires_at <= now) {
            return InviteValidity::Expired;
        }
        match self.max_uses {
            Some(max) if max > 0 && self.current_uses >= max => InviteValidity::Exhausted,
            _ => InviteValidity::Valid,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCodeOptions {
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_uses: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitePreview {
    pub group: Group,
    pub invite_code_data: InviteCodeRecord,
    pub validity: InviteValidity,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(now: DateTime<Utc>) -> InviteCodeRecord {
        InviteCodeRecord::new(
            InviteCode::parse("ABC123").unwrap(),
            GroupId(uuid::Uuid::nil()),
            &InviteCodeOptions::default(),
            now,
        )
    }

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        assert_eq!(InviteCode::parse(" abc123 ").unwrap().as_str(), "ABC123");
        assert!(InviteCode::parse("").is_none());
        assert!(InviteCode::parse("abc-123").is_none());
        assert!(InviteCode::parse(&"A".repeat(21)).is_none());
    }

    #[test]
    fn validity_follows_join_order() {
        let now = Utc::now();
        let mut code = record(now);
        assert_eq!(code.validity(now), InviteValidity::Valid);

        code.max_uses = Some(1);
        code.current_uses = 1;
        assert_eq!(code.validity(now), InviteValidity::Exhausted);

        code.expires_at = Some(now - Duration::seconds(1));
        assert_eq!(code.validity(now), InviteValidity::Expired);

        code.status = InviteCodeStatus::Superseded;
        assert_eq!(code.validity(now), InviteValidity::Inactive);
    }

    #[test]
    fn zero_max_uses_means_unlimited() {
        let now = Utc::now();
        let mut code = record(now);
        code.max_uses = Some(0);
        code.current_uses = 40;
        assert_eq!(code.validity(now), InviteValidity::Valid);
        assert!(!code.is_use_limited());
    }

    #[test]
    fn stored_form_carries_an_active_flag() {
        let json = serde_json::to_value(record(Utc::now())).unwrap();
        assert_eq!(json["isActive"], true);
        assert_eq!(json["status"], "active");
        assert!(json.get("maxUses").is_none());
    }
}
