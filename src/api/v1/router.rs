use super::error::*;
use super::handler;
use crate::application_port::AuthService;
use crate::domain_model::{Caller, GroupId};
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

/// Largest accepted JSON body.
const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let auth = || with_verification(server.auth_service.clone());

    let register_profile = warp::post()
        .and(warp::path!("profile"))
        .and(json_body())
        .and(auth())
        .and(with(server.profile_service.clone()))
        .and_then(handler::register_profile);

    let get_profile = warp::get()
        .and(warp::path!("profile"))
        .and(auth())
        .and(with(server.profile_service.clone()))
        .and_then(handler::get_profile);

    let list_groups = warp::get()
        .and(warp::path!("groups"))
        .and(auth())
        .and(with(server.group_service.clone()))
        .and_then(handler::list_groups);

    let create_group = warp::post()
        .and(warp::path!("groups"))
        .and(json_body())
        .and(auth())
        .and(with(server.group_service.clone()))
        .and_then(handler::create_group);

    let join_group = warp::post()
        .and(warp::path!("groups" / "join"))
        .and(json_body())
        .and(auth())
        .and(with(server.group_service.clone()))
        .and_then(handler::join_group);

    let get_group = warp::get()
        .and(warp::path!("groups" / GroupId))
        .and(auth())
        .and(with(server.group_service.clone()))
        .and_then(handler::get_group);

    let delete_group = warp::delete()
        .and(warp::path!("groups" / GroupId))
        .and(auth())
        .and(with(server.group_service.clone()))
        .and_then(handler::delete_group);

    let leave_group = warp::post()
        .and(warp::path!("groups" / GroupId / "leave"))
        .and(auth())
        .and(with(server.group_service.clone()))
        .and_then(handler::leave_group);

    let rotate_invite_code = warp::post()
        .and(warp::path!("groups" / GroupId / "invite_code"))
        .and(json_body_or_default())
        .and(auth())
        .and(with(server.group_service.clone()))
        .and_then(handler::rotate_invite_code);

    let list_members = warp::get()
        .and(warp::path!("groups" / GroupId / "members"))
        .and(auth())
        .and(with(server.group_service.clone()))
        .and_then(handler::list_members);

    let leaderboard = warp::get()
        .and(warp::path!("groups" / GroupId / "leaderboard"))
        .and(auth())
        .and(with(server.group_service.clone()))
        .and_then(handler::leaderboard);

    let preview_invite = warp::get()
        .and(warp::path!("invites" / String))
        .and(with(server.group_service.clone()))
        .and_then(handler::preview_invite);

    let append_log = warp::post()
        .and(warp::path!("logs"))
        .and(json_body())
        .and(auth())
        .and(with(server.log_service.clone()))
        .and_then(handler::append_log);

    let list_logs = warp::get()
        .and(warp::path!("logs"))
        .and(warp::query::<handler::LogListQuery>())
        .and(auth())
        .and(with(server.log_service.clone()))
        .and_then(handler::list_logs);

    register_profile
        .or(get_profile)
        .or(list_groups)
        .or(create_group)
        .or(join_group)
        .or(get_group)
        .or(delete_group)
        .or(leave_group)
        .or(rotate_invite_code)
        .or(list_members)
        .or(leaderboard)
        .or(preview_invite)
        .or(append_log)
        .or(list_logs)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

/// Like `json_body`, but a request without a body yields `T::default()`.
fn json_body_or_default<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Default + Send,
{
    let sized = warp::body::content_length_limit(MAX_BODY_BYTES)
        .and(warp::body::bytes())
        .and_then(|body: warp::hyper::body::Bytes| async move {
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(T::default());
            }
            serde_json::from_slice(&body).map_err(|e| {
                reject::custom(ApiFailure::with_message(ApiErrorCode::InvalidInput, e.to_string()))
            })
        });
    let bodiless = warp::header::optional::<String>(http::header::CONTENT_LENGTH.as_str())
        .and(warp::header::optional::<String>(http::header::TRANSFER_ENCODING.as_str()))
        .and_then(|length: Option<String>, encoding: Option<String>| async move {
            if length.is_none() && encoding.is_none() {
                Ok(T::default())
            } else {
                Err(reject::not_found())
            }
        });
    sized.or(bodiless).unify()
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (Caller,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_ref()).and_then(
        move |header: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                let Some(header) = header else {
                    return Err(reject::custom(ApiFailure::new(ApiErrorCode::AuthenticationRequired)));
                };
                if let Some(token) = header.strip_prefix("Bearer ") {
                    let caller = auth_service
                        .verify_token(token.trim())
                        .await
                        .map_err(ApiFailure::from)
                        .map_err(reject::custom)?;
                    Ok(caller)
                } else {
                    Err(reject::custom(ApiFailure::new(ApiErrorCode::InvalidToken)))
                }
            }
        },
    )
}
