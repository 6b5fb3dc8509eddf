use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let failure = if let Some(failure) = err.find::<ApiFailure>() {
        failure.clone()
    } else if err.is_not_found() {
        ApiFailure::new(ApiErrorCode::NotFound)
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        ApiFailure::with_message(ApiErrorCode::InvalidInput, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        ApiFailure::with_message(ApiErrorCode::InvalidInput, e.to_string())
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        ApiFailure::new(ApiErrorCode::AuthenticationRequired)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ApiFailure::new(ApiErrorCode::NotFound)
    } else {
        warn!("Unhandled rejection: {:?}", err);
        ApiFailure::new(ApiErrorCode::InternalError)
    };

    let status = failure.code.status();
    let json = warp::reply::json(&ApiResponse::<()>::err(failure.code, failure.message));
    Ok(warp::reply::with_status(json, status))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("User not authenticated")]
    AuthenticationRequired,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
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
    #[error("Group creators cannot leave their own group")]
    CreatorCannotLeave,
    #[error("You are not a member of this group")]
    NotMember,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid input")]
    InvalidInput,
    #[error("Not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::AuthenticationRequired | ApiErrorCode::InvalidToken | ApiErrorCode::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorCode::NotAuthorized => StatusCode::FORBIDDEN,
            ApiErrorCode::InvalidInviteCode | ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::GroupNotFound | ApiErrorCode::UserNotFound | ApiErrorCode::NotFound => {
                StatusCode::NOT_FOUND
            }
            ApiErrorCode::InviteCodeInactive
            | ApiErrorCode::InviteCodeExpired
            | ApiErrorCode::InviteCodeExhausted
            | ApiErrorCode::AlreadyMember
            | ApiErrorCode::GroupAtCapacity
            | ApiErrorCode::CreatorCannotLeave
            | ApiErrorCode::NotMember => StatusCode::CONFLICT,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Rejection carried through warp filters: a stable code plus the message shown to the client.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiFailure {
    pub fn new(code: ApiErrorCode) -> Self {
        ApiFailure {
            code,
            message: code.to_string(),
        }
    }

    pub fn with_message(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiFailure {
            code,
            message: message.into(),
        }
    }

    pub fn internal<E: std::fmt::Display>(error: E) -> Self {
        warn!("Internal error: {}", error);
        ApiFailure::new(ApiErrorCode::InternalError)
    }
}

impl reject::Reject for ApiFailure {}

impl From<AuthError> for ApiFailure {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::TokenInvalid => ApiFailure::new(ApiErrorCode::InvalidToken),
            AuthError::TokenExpired => ApiFailure::new(ApiErrorCode::TokenExpired),
            AuthError::InternalError(e) => ApiFailure::internal(e),
        }
    }
}

impl From<GroupError> for ApiFailure {
    fn from(error: GroupError) -> Self {
        let code = match &error {
            GroupError::AuthenticationRequired => ApiErrorCode::AuthenticationRequired,
            GroupError::NotAuthorized => ApiErrorCode::NotAuthorized,
            GroupError::InvalidInviteCode => ApiErrorCode::InvalidInviteCode,
            GroupError::InviteCodeInactive => ApiErrorCode::InviteCodeInactive,
            GroupError::InviteCodeExpired => ApiErrorCode::InviteCodeExpired,
            GroupError::InviteCodeExhausted => ApiErrorCode::InviteCodeExhausted,
            GroupError::GroupNotFound => ApiErrorCode::GroupNotFound,
            GroupError::AlreadyMember => ApiErrorCode::AlreadyMember,
            GroupError::GroupAtCapacity => ApiErrorCode::GroupAtCapacity,
            GroupError::CreatorCannotLeave => ApiErrorCode::CreatorCannotLeave,
            GroupError::NotMember => ApiErrorCode::NotMember,
            GroupError::UserNotFound => ApiErrorCode::UserNotFound,
            GroupError::Validation(_) => ApiErrorCode::InvalidInput,
            GroupError::StoreUnavailable(e) => return ApiFailure::internal(e),
        };
        ApiFailure::with_message(code, error.to_string())
    }
}
