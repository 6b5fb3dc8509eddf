use crate::domain_model::*;
use crate::domain_port::StoreError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("User not authenticated")]
    AuthenticationRequired,
    #[error("You are not authorized to perform this action")]
    NotAuthorized,
    #[error("Invalid invite code")]
    InvalidInviteCode,
    #[error("Invite code is no longer active")]
    InviteCodeInactive,
    #[error("Invite code has expired")]
    InviteCodeExpired,
    #[error("Invite code has reached maximum uses")]
    InviteCodeExhausted,
    #[error("Group not found")]
    GroupNotFound,
    #[error("You are already a member of this group")]
    AlreadyMember,
    #[error("Group is at maximum capacity")]
    GroupAtCapacity,
    #[error("Group creators cannot leave their own group; delete the group instead")]
    CreatorCannotLeave,
    #[error("You are not a member of this group")]
    NotMember,
    #[error("User not found")]
    UserNotFound,
    #[error("{0}")]
    Validation(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for GroupError {
    fn from(err: StoreError) -> Self {
        GroupError::StoreUnavailable(err.to_string())
    }
}

impl From<validator::ValidationErrors> for GroupError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .collect::<Vec<_>>()
            .join("; ");
        if message.is_empty() {
            GroupError::Validation(errors.to_string())
        } else {
            GroupError::Validation(message)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub removed: Vec<GroupId>,
    pub added: Vec<GroupId>,
}

impl RepairReport {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

#[async_trait::async_trait]
pub trait GroupService: Send + Sync {
    async fn create_group(&self, caller: &Caller, new_group: NewGroup) -> Result<GroupId, GroupError>;
    async fn join_group_by_invite_code(&self, caller: &Caller, code: &str) -> Result<GroupId, GroupError>;
    async fn leave_group(&self, caller: &Caller, group_id: GroupId) -> Result<(), GroupError>;
    async fn generate_new_invite_code(
        &self,
        caller: &Caller,
        group_id: GroupId,
        options: InviteCodeOptions,
    ) -> Result<InviteCode, GroupError>;
    async fn delete_group(&self, caller: &Caller, group_id: GroupId) -> Result<(), GroupError>;
    async fn preview_group_by_invite_code(&self, code: &str) -> Result<Option<InvitePreview>, GroupError>;

    async fn get_group(&self, group_id: GroupId) -> Result<Group, GroupError>;
    async fn list_groups_for_user(&self, user_id: UserId) -> Result<Vec<Group>, GroupError>;
    async fn repair_group_references(&self, user_id: UserId) -> Result<RepairReport, GroupError>;
    async fn list_members(&self, group_id: GroupId) -> Result<Vec<Membership>, GroupError>;
    async fn leaderboard(&self, group_id: GroupId) -> Result<Vec<Membership>, GroupError>;
    async fn member_role(&self, group_id: GroupId, user_id: UserId) -> Result<Option<GroupMemberRole>, GroupError>;
}
