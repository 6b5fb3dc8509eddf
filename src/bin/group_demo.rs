//! Walks through the group lifecycle over the in-memory store.
//!
//! $ cargo run --bin group_demo

use std::sync::Arc;
use streakboard::application_impl::FakeAuthService;
use streakboard::application_port::*;
use streakboard::domain_model::*;
use streakboard::infra_memory::MemoryDocumentStore;
use streakboard::logger::*;
use streakboard::server::{EngineOptions, Server};

async fn register(server: &Server, name: &str) -> anyhow::Result<Caller> {
    let token = FakeAuthService::token_for(UserId(uuid::Uuid::new_v4()));
    let caller = server.auth_service.verify_token(&token).await?;
    server
        .profile_service
        .register_profile(
            &caller,
            NewProfile {
                display_name: name.to_owned(),
                timezone: None,
                default_privacy: None,
            },
        )
        .await?;
    Ok(caller)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _logger = Logger::new_bootstrap()?;

    let server = Server::with_backends(
        Arc::new(MemoryDocumentStore::new()),
        Arc::new(FakeAuthService::new()),
        &EngineOptions::default(),
    );
    let groups = server.group_service.clone();

    let alice = register(&server, "alice").await?;
    let bob = register(&server, "bob").await?;
    let carol = register(&server, "carol").await?;

    let group_id = groups
        .create_group(&alice, NewGroup::named("Streakers").with_max_members(2))
        .await?;
    let code = groups.get_group(group_id).await?.invite_code;
    info!(%group_id, %code, "alice created Streakers");

    if let Some(preview) = groups.preview_group_by_invite_code(&code.as_str().to_lowercase()).await? {
        info!(name = %preview.group.name, validity = ?preview.validity, "bob previews the invite");
    }

    groups.join_group_by_invite_code(&bob, code.as_str()).await?;
    info!("bob joined");

    match groups.join_group_by_invite_code(&carol, code.as_str()).await {
        Err(e) => info!("carol could not join: {e}"),
        Ok(_) => warn!("carol joined a full group"),
    }

    let new_code = groups
        .generate_new_invite_code(&alice, group_id, InviteCodeOptions::default())
        .await?;
    info!(old = %code, new = %new_code, "alice rotated the invite code");
    if let Err(e) = groups.join_group_by_invite_code(&carol, code.as_str()).await {
        info!("carol tried the old code: {e}");
    }

    server
        .log_service
        .append_log(
            &bob,
            NewLogEntry {
                timestamp: None,
                is_public: true,
                groups: vec![group_id],
            },
        )
        .await?;
    for member in groups.leaderboard(group_id).await? {
        info!(name = %member.display_name, logs = member.stats.total_logs, "leaderboard");
    }

    groups.delete_group(&alice, group_id).await?;
    info!(remaining = groups.list_groups_for_user(bob.user_id).await?.len(), "alice deleted the group");

    server.shutdown().await;
    Ok(())
}
