use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

fn reply<T: Serialize>(data: T) -> warp::reply::Json {
    warp::reply::json(&ApiResponse::ok(data))
}

// region profile

pub async fn register_profile(
    body: NewProfile,
    caller: Caller,
    profile_service: Arc<dyn ProfileService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let profile = profile_service
        .register_profile(&caller, body)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(profile))
}

pub async fn get_profile(
    caller: Caller,
    profile_service: Arc<dyn ProfileService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let profile = profile_service
        .get_profile(caller.user_id)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(profile))
}

// endregion

// region groups

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupIdResponse {
    pub group_id: GroupId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub invite_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCodeResponse {
    pub invite_code: InviteCode,
}

pub async fn list_groups(
    caller: Caller,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let groups = group_service
        .list_groups_for_user(caller.user_id)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(groups))
}

pub async fn create_group(
    body: NewGroup,
    caller: Caller,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let group_id = group_service
        .create_group(&caller, body)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(GroupIdResponse { group_id }))
}

pub async fn join_group(
    body: JoinRequest,
    caller: Caller,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let group_id = group_service
        .join_group_by_invite_code(&caller, &body.invite_code)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(GroupIdResponse { group_id }))
}

pub async fn get_group(
    group_id: GroupId,
    _caller: Caller,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let group = group_service
        .get_group(group_id)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(group))
}

pub async fn delete_group(
    group_id: GroupId,
    caller: Caller,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    group_service
        .delete_group(&caller, group_id)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(GroupIdResponse { group_id }))
}

pub async fn leave_group(
    group_id: GroupId,
    caller: Caller,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    group_service
        .leave_group(&caller, group_id)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(GroupIdResponse { group_id }))
}

pub async fn rotate_invite_code(
    group_id: GroupId,
    body: InviteCodeOptions,
    caller: Caller,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let invite_code = group_service
        .generate_new_invite_code(&caller, group_id, body)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(InviteCodeResponse { invite_code }))
}

pub async fn list_members(
    group_id: GroupId,
    _caller: Caller,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let members = group_service
        .list_members(group_id)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(members))
}

pub async fn leaderboard(
    group_id: GroupId,
    _caller: Caller,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let members = group_service
        .leaderboard(group_id)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(members))
}

/// Unauthenticated: anyone holding a code may look at the group behind it.
pub async fn preview_invite(
    code: String,
    group_service: Arc<dyn GroupService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let preview = group_service
        .preview_group_by_invite_code(&code)
        .await
        .map_err(ApiFailure::from)?
        .ok_or_else(|| ApiFailure::new(ApiErrorCode::InvalidInviteCode))?;
    Ok(reply(preview))
}

// endregion

// region logs

#[derive(Debug, Deserialize)]
pub struct LogListQuery {
    pub limit: Option<usize>,
}

pub async fn append_log(
    body: NewLogEntry,
    caller: Caller,
    log_service: Arc<dyn LogService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let log = log_service
        .append_log(&caller, body)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(log))
}

pub async fn list_logs(
    query: LogListQuery,
    caller: Caller,
    log_service: Arc<dyn LogService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let logs = log_service
        .list_logs(&caller, query.limit)
        .await
        .map_err(ApiFailure::from)?;
    Ok(reply(logs))
}

// endregion
