use crate::application_port::*;
use crate::domain_model::{Caller, UserId};

pub const FAKE_TOKEN_PREFIX: &str = "dev-";

/// Development identity store: `dev-<uuid>` is a valid token for that user.
#[derive(Debug, Default)]
pub struct FakeAuthService;

impl FakeAuthService {
    pub fn new() -> Self {
        Self
    }

    pub fn token_for(user_id: UserId) -> String {
        format!("{FAKE_TOKEN_PREFIX}{user_id}")
    }
}

#[async_trait::async_trait]
impl AuthService for FakeAuthService {
    async fn verify_token(&self, token: &str) -> Result<Caller, AuthError> {
        let user_id = token
            .strip_prefix(FAKE_TOKEN_PREFIX)
            .and_then(|id| id.parse::<UserId>().ok())
            .ok_or(AuthError::TokenInvalid)?;
        Ok(Caller {
            user_id,
            email: format!("{user_id}@dev.local"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dev_tokens() {
        let user_id = UserId(uuid::Uuid::new_v4());
        let caller = FakeAuthService.verify_token(&FakeAuthService::token_for(user_id)).await.unwrap();
        assert_eq!(caller.user_id, user_id);
        assert!(FakeAuthService.verify_token("dev-nope").await.is_err());
        assert!(FakeAuthService.verify_token(&user_id.to_string()).await.is_err());
    }
}
