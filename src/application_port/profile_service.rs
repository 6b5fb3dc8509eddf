use crate::application_port::GroupError;
use crate::domain_model::*;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    #[validate(length(min = 1, max = 30, message = "display name must be 1-30 characters"))]
    pub display_name: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub default_privacy: Option<bool>,
}

#[async_trait::async_trait]
pub trait ProfileService: Send + Sync {
    /// Creates the profile on first call; later calls return the stored one.
    async fn register_profile(&self, caller: &Caller, profile: NewProfile) -> Result<UserProfile, GroupError>;
    async fn get_profile(&self, user_id: UserId) -> Result<UserProfile, GroupError>;
}
