//! Document layout shared by every store backend.

use crate::domain_model::{GroupId, InviteCode, LogId, UserId};
use crate::domain_port::DocumentPath;

pub const USERS: &str = "users";
pub const GROUPS: &str = "groups";
pub const MEMBERS: &str = "members";
pub const INVITE_CODES: &str = "inviteCodes";
pub const LOGS: &str = "logs";
pub const DAILY_STATS: &str = "dailyStats";

pub fn user(user_id: UserId) -> DocumentPath {
    DocumentPath::from_segments([USERS, &user_id.to_string()])
}

pub fn logs(user_id: UserId) -> String {
    format!("{USERS}/{user_id}/{LOGS}")
}

pub fn log(user_id: UserId, log_id: LogId) -> DocumentPath {
    DocumentPath::from_segments([USERS, &user_id.to_string(), LOGS, &log_id.to_string()])
}

pub fn daily_stats(user_id: UserId, day_key: &str) -> DocumentPath {
    DocumentPath::from_segments([USERS, &user_id.to_string(), DAILY_STATS, day_key])
}

pub fn group(group_id: GroupId) -> DocumentPath {
    DocumentPath::from_segments([GROUPS, &group_id.to_string()])
}

pub fn members(group_id: GroupId) -> String {
    format!("{GROUPS}/{group_id}/{MEMBERS}")
}

pub fn member(group_id: GroupId, user_id: UserId) -> DocumentPath {
    DocumentPath::from_segments([GROUPS, &group_id.to_string(), MEMBERS, &user_id.to_string()])
}

pub fn invite_code(code: &InviteCode) -> DocumentPath {
    DocumentPath::from_segments([INVITE_CODES, code.as_str()])
}
