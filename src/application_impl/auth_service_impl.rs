use crate::application_port::*;
use crate::domain_model::{Caller, UserId};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub signing_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String, // user id
    email: String,
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
}

/// Verifies HS256 access tokens minted by the identity provider.
pub struct JwtAuthService {
    cfg: JwtConfig,
}

impl JwtAuthService {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtAuthService { cfg }
    }

    /// Mints a token the way the identity provider does; used by tooling and tests.
    pub fn issue_token(&self, caller: &Caller, ttl: Duration) -> Result<String, AuthError> {
        let iat = Utc::now();
        let claims = AccessClaims {
            sub: caller.user_id.to_string(),
            email: caller.email.clone(),
            exp: (iat + ttl).timestamp(),
            iat: iat.timestamp(),
            iss: self.cfg.issuer.clone(),
            aud: self.cfg.audience.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.cfg.signing_key),
        )
        .map_err(|e| AuthError::InternalError(e.to_string()))
    }
}

#[async_trait::async_trait]
impl AuthService for JwtAuthService {
    async fn verify_token(&self, token: &str) -> Result<Caller, AuthError> {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        v.leeway = 0;
        v.set_audience(&[self.cfg.audience.clone()]);
        v.set_issuer(&[self.cfg.issuer.clone()]);
        let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(&self.cfg.signing_key), &v)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })?;

        let user_id = data
            .claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::TokenInvalid)?;
        Ok(Caller {
            user_id,
            email: data.claims.email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(audience: &str) -> JwtAuthService {
        JwtAuthService::new(JwtConfig {
            issuer: "streakboard-test".to_owned(),
            audience: audience.to_owned(),
            signing_key: b"test-signing-key".to_vec(),
        })
    }

    fn alice() -> Caller {
        Caller {
            user_id: UserId(uuid::Uuid::new_v4()),
            email: "alice@example.com".to_owned(),
        }
    }

    #[tokio::test]
    async fn issued_token_round_trips() {
        let svc = service("app");
        let caller = alice();
        let token = svc.issue_token(&caller, Duration::minutes(5)).unwrap();
        assert_eq!(svc.verify_token(&token).await.unwrap(), caller);
    }

    #[tokio::test]
    async fn rejects_expired_foreign_and_garbage_tokens() {
        let svc = service("app");
        let expired = svc.issue_token(&alice(), Duration::minutes(-5)).unwrap();
        assert!(matches!(svc.verify_token(&expired).await, Err(AuthError::TokenExpired)));

        let foreign = service("other").issue_token(&alice(), Duration::minutes(5)).unwrap();
        assert!(matches!(svc.verify_token(&foreign).await, Err(AuthError::TokenInvalid)));

        assert!(matches!(svc.verify_token("not-a-jwt").await, Err(AuthError::TokenInvalid)));
    }
}
