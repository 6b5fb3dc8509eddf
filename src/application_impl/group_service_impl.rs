use super::optimistic::{Attempt, commit, exhausted, load, load_all};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

pub const DEFAULT_MAX_COMMIT_ATTEMPTS: usize = 5;

fn id_value<T: ToString>(id: T) -> Value {
    Value::String(id.to_string())
}

fn deactivate(status: InviteCodeStatus, now: chrono::DateTime<Utc>) -> Result<Vec<FieldWrite>, GroupError> {
    Ok(vec![
        FieldWrite::set("status", to_value(&status)?),
        FieldWrite::set("isActive", Value::Bool(false)),
        FieldWrite::set("deactivatedAt", to_value(&now)?),
    ])
}

pub struct RealGroupService {
    store: Arc<dyn DocumentStore>,
    codes: Arc<dyn InviteCodeGenerator>,
    repair: Arc<dyn RepairScheduler>,
    max_commit_attempts: usize,
    default_max_members: u32,
}

impl RealGroupService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        codes: Arc<dyn InviteCodeGenerator>,
        repair: Arc<dyn RepairScheduler>,
    ) -> Self {
        RealGroupService {
            store,
            codes,
            repair,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            default_max_members: DEFAULT_GROUP_SIZE,
        }
    }

    pub fn with_max_commit_attempts(mut self, attempts: usize) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    pub fn with_default_max_members(mut self, max_members: u32) -> Self {
        self.default_max_members = max_members.clamp(MIN_GROUP_SIZE, MAX_GROUP_SIZE);
        self
    }

    async fn caller_profile(&self, caller: &Caller) -> Result<UserProfile, GroupError> {
        match load::<UserProfile>(self.store.as_ref(), &paths::user(caller.user_id)).await? {
            Some((_, profile)) => Ok(profile),
            None => Err(GroupError::AuthenticationRequired),
        }
    }

    async fn group_snapshot(&self, group_id: GroupId) -> Result<(Snapshot, Group), GroupError> {
        load::<Group>(self.store.as_ref(), &paths::group(group_id))
            .await?
            .ok_or(GroupError::GroupNotFound)
    }

    async fn try_create(
        &self,
        caller: &Caller,
        profile: &UserProfile,
        new_group: &NewGroup,
        group_id: GroupId,
    ) -> Result<Attempt<InviteCode>, GroupError> {
        let now = Utc::now();
        let code = self.codes.generate();

        let group = Group {
            id: group_id,
            name: new_group.name.trim().to_owned(),
            description: new_group
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_owned),
            created_by: caller.user_id,
            created_at: now,
            invite_code: code.clone(),
            settings: new_group.settings(self.default_max_members),
            stats: GroupStats {
                member_count: 1,
                total_logs: 0,
                last_activity: now,
            },
            member_ids: vec![caller.user_id],
        };
        let admin = Membership {
            user_id: caller.user_id,
            display_name: profile.display_name.clone(),
            role: GroupMemberRole::Admin,
            joined_at: now,
            last_activity: now,
            stats: MemberStats::from(&profile.stats),
        };
        let record = InviteCodeRecord::new(code.clone(), group_id, &InviteCodeOptions::default(), now);

        let mut batch = WriteBatch::new();
        batch
            .create(paths::group(group_id), &group)?
            .create(paths::member(group_id, caller.user_id), &admin)?
            .create(paths::invite_code(&code), &record)?;
        batch.update(
            paths::user(caller.user_id),
            vec![FieldWrite::array_union("groups", vec![id_value(group_id)])],
        );

        commit(self.store.as_ref(), batch, code).await
    }

    async fn try_join(&self, caller: &Caller, code: &InviteCode) -> Result<Attempt<GroupId>, GroupError> {
        let profile = self.caller_profile(caller).await?;

        let (code_snapshot, record) = load::<InviteCodeRecord>(self.store.as_ref(), &paths::invite_code(code))
            .await?
            .ok_or(GroupError::InvalidInviteCode)?;
        match record.validity(Utc::now()) {
            InviteValidity::Valid => {}
            InviteValidity::Inactive => return Err(GroupError::InviteCodeInactive),
            InviteValidity::Expired => return Err(GroupError::InviteCodeExpired),
            InviteValidity::Exhausted => return Err(GroupError::InviteCodeExhausted),
        }

        let (group_snapshot, group) = load::<Group>(self.store.as_ref(), &paths::group(record.group_id))
            .await?
            .ok_or(GroupError::GroupNotFound)?;
        if group.is_member(caller.user_id) {
            return Err(GroupError::AlreadyMember);
        }
        if group.is_full() {
            return Err(GroupError::GroupAtCapacity);
        }

        let now = Utc::now();
        let membership = Membership {
            user_id: caller.user_id,
            display_name: profile.display_name.clone(),
            role: GroupMemberRole::Member,
            joined_at: now,
            last_activity: now,
            stats: MemberStats::from(&profile.stats),
        };

        let mut batch = WriteBatch::new();
        batch.create(paths::member(group.id, caller.user_id), &membership)?;
        batch
            .update(
                paths::group(group.id),
                vec![
                    FieldWrite::increment("stats.memberCount", 1),
                    FieldWrite::array_union("memberIds", vec![id_value(caller.user_id)]),
                ],
            )
            .update(
                paths::user(caller.user_id),
                vec![FieldWrite::array_union("groups", vec![id_value(group.id)])],
            )
            .update(
                paths::invite_code(code),
                vec![FieldWrite::increment("currentUses", 1)],
            )
            .expect_version(&group_snapshot);
        // Rotation and deletion bump the group version, so only a use limit
        // needs the code's own version.
        if record.is_use_limited() {
            batch.expect_version(&code_snapshot);
        } else {
            batch.expect(code_snapshot.path.clone(), Precondition::Exists);
        }

        commit(self.store.as_ref(), batch, group.id).await
    }

    async fn try_leave(&self, caller: &Caller, group_id: GroupId) -> Result<Attempt<()>, GroupError> {
        let (group_snapshot, group) = self.group_snapshot(group_id).await?;
        if group.created_by == caller.user_id {
            return Err(GroupError::CreatorCannotLeave);
        }
        if !group.is_member(caller.user_id) {
            return Err(GroupError::NotMember);
        }

        let mut batch = WriteBatch::new();
        batch
            .delete(paths::member(group_id, caller.user_id))
            .update(
                paths::group(group_id),
                vec![
                    FieldWrite::increment("stats.memberCount", -1),
                    FieldWrite::array_remove("memberIds", vec![id_value(caller.user_id)]),
                ],
            )
            .update_existing(
                paths::user(caller.user_id),
                vec![FieldWrite::array_remove("groups", vec![id_value(group_id)])],
            )
            .expect_version(&group_snapshot);

        commit(self.store.as_ref(), batch, ()).await
    }

    async fn try_rotate(
        &self,
        caller: &Caller,
        group_id: GroupId,
        options: &InviteCodeOptions,
    ) -> Result<Attempt<InviteCode>, GroupError> {
        let (group_snapshot, group) = self.group_snapshot(group_id).await?;
        if group.created_by != caller.user_id {
            return Err(GroupError::NotAuthorized);
        }

        let now = Utc::now();
        let code = self.codes.generate();
        let record = InviteCodeRecord::new(code.clone(), group_id, options, now);

        let mut batch = WriteBatch::new();
        batch.update_existing(
            paths::invite_code(&group.invite_code),
            deactivate(InviteCodeStatus::Superseded, now)?,
        );
        batch.create(paths::invite_code(&code), &record)?;
        batch
            .update(
                paths::group(group_id),
                vec![FieldWrite::set("inviteCode", id_value(&code))],
            )
            .expect_version(&group_snapshot);

        commit(self.store.as_ref(), batch, code).await
    }

    async fn try_delete(&self, caller: &Caller, group_id: GroupId) -> Result<Attempt<usize>, GroupError> {
        let (group_snapshot, group) = self.group_snapshot(group_id).await?;
        if group.created_by != caller.user_id {
            return Err(GroupError::NotAuthorized);
        }

        let memberships: Vec<Membership> = load_all(self.store.as_ref(), &paths::members(group_id)).await?;
        let members: BTreeSet<UserId> = memberships
            .iter()
            .map(|m| m.user_id)
            .chain(group.member_ids.iter().copied())
            .collect();

        let now = Utc::now();
        let mut batch = WriteBatch::new();
        for user_id in &members {
            batch
                .update_existing(
                    paths::user(*user_id),
                    vec![FieldWrite::array_remove("groups", vec![id_value(group_id)])],
                )
                .delete(paths::member(group_id, *user_id));
        }
        batch
            .update_existing(
                paths::invite_code(&group.invite_code),
                deactivate(InviteCodeStatus::Revoked, now)?,
            )
            .delete(paths::group(group_id))
            .expect_version(&group_snapshot);

        commit(self.store.as_ref(), batch, members.len()).await
    }

    async fn try_repair(&self, user_id: UserId) -> Result<Attempt<RepairReport>, GroupError> {
        let (user_snapshot, profile) = load::<UserProfile>(self.store.as_ref(), &paths::user(user_id))
            .await?
            .ok_or(GroupError::UserNotFound)?;

        let groups: Vec<Group> = load_all(self.store.as_ref(), paths::GROUPS).await?;
        let actual: BTreeSet<GroupId> = groups
            .iter()
            .filter(|g| g.is_member(user_id))
            .map(|g| g.id)
            .collect();
        let cached: BTreeSet<GroupId> = profile.groups.iter().copied().collect();

        let report = RepairReport {
            removed: cached.difference(&actual).copied().collect(),
            added: actual.difference(&cached).copied().collect(),
        };
        let has_duplicates = cached.len() != profile.groups.len();
        if report.is_noop() && !has_duplicates {
            return Ok(Attempt::Done(report));
        }

        // Keep the cached order for surviving entries.
        let mut repaired: Vec<GroupId> = Vec::with_capacity(actual.len());
        for group_id in profile.groups.iter().chain(report.added.iter()) {
            if actual.contains(group_id) && !repaired.contains(group_id) {
                repaired.push(*group_id);
            }
        }

        let mut batch = WriteBatch::new();
        batch
            .update(
                paths::user(user_id),
                vec![FieldWrite::set("groups", to_value(&repaired)?)],
            )
            .expect_version(&user_snapshot);

        commit(self.store.as_ref(), batch, report).await
    }
}

#[async_trait::async_trait]
impl GroupService for RealGroupService {
    async fn create_group(&self, caller: &Caller, new_group: NewGroup) -> Result<GroupId, GroupError> {
        new_group.validate()?;
        if new_group.name.trim().is_empty() {
            return Err(GroupError::Validation("group name is required".to_owned()));
        }
        let profile = self.caller_profile(caller).await?;
        let group_id = GroupId::new_v4();

        for attempt in 1..=self.max_commit_attempts {
            match self.try_create(caller, &profile, &new_group, group_id).await? {
                Attempt::Done(code) => {
                    info!(%group_id, user_id = %caller.user_id, %code, "group created");
                    return Ok(group_id);
                }
                Attempt::Conflicted => debug!(attempt, "create_group conflicted, drawing a new code"),
            }
        }
        Err(exhausted("create_group", self.max_commit_attempts))
    }

    async fn join_group_by_invite_code(&self, caller: &Caller, code: &str) -> Result<GroupId, GroupError> {
        let code = InviteCode::parse(code).ok_or(GroupError::InvalidInviteCode)?;

        for attempt in 1..=self.max_commit_attempts {
            match self.try_join(caller, &code).await? {
                Attempt::Done(group_id) => {
                    info!(%group_id, user_id = %caller.user_id, %code, "joined group");
                    return Ok(group_id);
                }
                Attempt::Conflicted => debug!(attempt, "join conflicted, retrying"),
            }
        }
        Err(exhausted("join_group_by_invite_code", self.max_commit_attempts))
    }

    async fn leave_group(&self, caller: &Caller, group_id: GroupId) -> Result<(), GroupError> {
        for attempt in 1..=self.max_commit_attempts {
            match self.try_leave(caller, group_id).await? {
                Attempt::Done(()) => {
                    info!(%group_id, user_id = %caller.user_id, "left group");
                    return Ok(());
                }
                Attempt::Conflicted => debug!(attempt, "leave conflicted, retrying"),
            }
        }
        Err(exhausted("leave_group", self.max_commit_attempts))
    }

    async fn generate_new_invite_code(
        &self,
        caller: &Caller,
        group_id: GroupId,
        options: InviteCodeOptions,
    ) -> Result<InviteCode, GroupError> {
        for attempt in 1..=self.max_commit_attempts {
            match self.try_rotate(caller, group_id, &options).await? {
                Attempt::Done(code) => {
                    info!(%group_id, %code, "invite code rotated");
                    return Ok(code);
                }
                Attempt::Conflicted => debug!(attempt, "rotation conflicted, retrying"),
            }
        }
        Err(exhausted("generate_new_invite_code", self.max_commit_attempts))
    }

    async fn delete_group(&self, caller: &Caller, group_id: GroupId) -> Result<(), GroupError> {
        for attempt in 1..=self.max_commit_attempts {
            match self.try_delete(caller, group_id).await? {
                Attempt::Done(members) => {
                    info!(%group_id, members, "group deleted");
                    return Ok(());
                }
                Attempt::Conflicted => debug!(attempt, "delete conflicted, retrying"),
            }
        }
        Err(exhausted("delete_group", self.max_commit_attempts))
    }

    async fn preview_group_by_invite_code(&self, code: &str) -> Result<Option<InvitePreview>, GroupError> {
        let Some(code) = InviteCode::parse(code) else {
            return Ok(None);
        };
        let Some((_, record)) = load::<InviteCodeRecord>(self.store.as_ref(), &paths::invite_code(&code)).await?
        else {
            return Ok(None);
        };
        let Some((_, group)) = load::<Group>(self.store.as_ref(), &paths::group(record.group_id)).await? else {
            return Ok(None);
        };

        let validity = record.validity(Utc::now());
        Ok(Some(InvitePreview {
            group,
            invite_code_data: record,
            validity,
        }))
    }

    async fn get_group(&self, group_id: GroupId) -> Result<Group, GroupError> {
        let (_, group) = self.group_snapshot(group_id).await?;
        Ok(group)
    }

    async fn list_groups_for_user(&self, user_id: UserId) -> Result<Vec<Group>, GroupError> {
        let profile = match load::<UserProfile>(self.store.as_ref(), &paths::user(user_id)).await {
            Ok(Some((_, profile))) => profile,
            Ok(None) => return Ok(Vec::new()),
            Err(e) => {
                warn!(%user_id, error = %e, "failed to load user groups");
                return Ok(Vec::new());
            }
        };

        let mut seen = BTreeSet::new();
        let unique: Vec<GroupId> = profile.groups.iter().copied().filter(|id| seen.insert(*id)).collect();
        let mut stale = unique.len() != profile.groups.len();

        let store = self.store.as_ref();
        let lookups = unique.iter().map(|group_id| async move {
            load::<Group>(store, &paths::group(*group_id)).await
        });
        let results = futures_util::future::join_all(lookups).await;

        let mut groups = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(Some((_, group))) if group.is_member(user_id) => groups.push(group),
                Ok(_) => stale = true,
                Err(e) => {
                    warn!(%user_id, error = %e, "failed to load user groups");
                    return Ok(Vec::new());
                }
            }
        }

        if stale {
            debug!(%user_id, "stale group references, scheduling repair");
            self.repair.schedule(user_id);
        }
        Ok(groups)
    }

    async fn repair_group_references(&self, user_id: UserId) -> Result<RepairReport, GroupError> {
        for attempt in 1..=self.max_commit_attempts {
            match self.try_repair(user_id).await? {
                Attempt::Done(report) => {
                    if !report.is_noop() {
                        info!(%user_id, removed = report.removed.len(), added = report.added.len(), "group references repaired");
                    }
                    return Ok(report);
                }
                Attempt::Conflicted => debug!(attempt, "repair conflicted, retrying"),
            }
        }
        Err(exhausted("repair_group_references", self.max_commit_attempts))
    }

    async fn list_members(&self, group_id: GroupId) -> Result<Vec<Membership>, GroupError> {
        self.group_snapshot(group_id).await?;
        let mut members: Vec<Membership> = load_all(self.store.as_ref(), &paths::members(group_id)).await?;
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.user_id.cmp(&b.user_id)));
        Ok(members)
    }

    async fn leaderboard(&self, group_id: GroupId) -> Result<Vec<Membership>, GroupError> {
        let mut members = self.list_members(group_id).await?;
        // Stable: ties keep join order.
        members.sort_by(|a, b| b.stats.total_logs.cmp(&a.stats.total_logs));
        Ok(members)
    }

    async fn member_role(&self, group_id: GroupId, user_id: UserId) -> Result<Option<GroupMemberRole>, GroupError> {
        let membership = load::<Membership>(self.store.as_ref(), &paths::member(group_id, user_id)).await?;
        Ok(membership.map(|(_, m)| m.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::NanoidCodeGenerator;
    use crate::infra_memory::MemoryDocumentStore;

    async fn seed_user(store: &MemoryDocumentStore, name: &str) -> Caller {
        let user_id = UserId(uuid::Uuid::new_v4());
        let now = Utc::now();
        let profile = UserProfile {
            id: user_id,
            email: format!("{name}@example.com"),
            display_name: name.to_owned(),
            created_at: now,
            last_active: now,
            settings: UserSettings::default(),
            stats: UserStats::default(),
            groups: Vec::new(),
        };
        let mut batch = WriteBatch::new();
        batch.set(paths::user(user_id), &profile).unwrap();
        store.commit(batch).await.unwrap();
        Caller {
            user_id,
            email: profile.email,
        }
    }

    fn service(store: Arc<MemoryDocumentStore>) -> RealGroupService {
        RealGroupService::new(store, Arc::new(NanoidCodeGenerator::default()), Arc::new(NoRepair))
    }

    #[tokio::test]
    async fn create_group_requires_profile() {
        let store = Arc::new(MemoryDocumentStore::new());
        let svc = service(store.clone());
        let stranger = Caller {
            user_id: UserId(uuid::Uuid::new_v4()),
            email: "x@example.com".to_owned(),
        };
        let err = svc.create_group(&stranger, NewGroup::named("Streakers")).await.unwrap_err();
        assert!(matches!(err, GroupError::AuthenticationRequired));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn create_group_rejects_invalid_input() {
        let store = Arc::new(MemoryDocumentStore::new());
        let svc = service(store.clone());
        let alice = seed_user(&store, "alice").await;
        let err = svc
            .create_group(&alice, NewGroup::named("Streakers").with_max_members(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::Validation(_)));
        let err = svc.create_group(&alice, NewGroup::named("   ")).await.unwrap_err();
        assert!(matches!(err, GroupError::Validation(_)));
    }

    #[tokio::test]
    async fn create_group_writes_every_document() {
        let store = Arc::new(MemoryDocumentStore::new());
        let svc = service(store.clone());
        let alice = seed_user(&store, "alice").await;

        let group_id = svc.create_group(&alice, NewGroup::named("Streakers")).await.unwrap();

        let group = svc.get_group(group_id).await.unwrap();
        assert_eq!(group.stats.member_count, 1);
        assert_eq!(group.member_ids, vec![alice.user_id]);
        assert_eq!(group.settings.max_members, DEFAULT_GROUP_SIZE);
        assert_eq!(
            svc.member_role(group_id, alice.user_id).await.unwrap(),
            Some(GroupMemberRole::Admin)
        );

        let code = store.get(&paths::invite_code(&group.invite_code)).await.unwrap().unwrap();
        let record: InviteCodeRecord = code.decode().unwrap();
        assert!(record.is_active());
        assert_eq!(record.current_uses, 0);

        let profile: UserProfile = store
            .get(&paths::user(alice.user_id))
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(profile.groups, vec![group_id]);
    }

    #[tokio::test]
    async fn join_checks_run_in_order() {
        let store = Arc::new(MemoryDocumentStore::new());
        let svc = service(store.clone());
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;

        assert!(matches!(
            svc.join_group_by_invite_code(&bob, "not a code").await,
            Err(GroupError::InvalidInviteCode)
        ));
        assert!(matches!(
            svc.join_group_by_invite_code(&bob, "ZZZZZZ").await,
            Err(GroupError::InvalidInviteCode)
        ));

        let group_id = svc.create_group(&alice, NewGroup::named("Streakers")).await.unwrap();
        let expired = svc
            .generate_new_invite_code(
                &alice,
                group_id,
                InviteCodeOptions {
                    expires_at: Some(Utc::now() - chrono::Duration::minutes(1)),
                    max_uses: None,
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            svc.join_group_by_invite_code(&bob, expired.as_str()).await,
            Err(GroupError::InviteCodeExpired)
        ));

        let single_use = svc
            .generate_new_invite_code(
                &alice,
                group_id,
                InviteCodeOptions {
                    expires_at: None,
                    max_uses: Some(1),
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            svc.join_group_by_invite_code(&bob, expired.as_str()).await,
            Err(GroupError::InviteCodeInactive)
        ));
        svc.join_group_by_invite_code(&bob, &single_use.as_str().to_lowercase())
            .await
            .unwrap();

        let carol = seed_user(&store, "carol").await;
        assert!(matches!(
            svc.join_group_by_invite_code(&carol, single_use.as_str()).await,
            Err(GroupError::InviteCodeExhausted)
        ));
    }

    #[tokio::test]
    async fn creator_is_the_only_admin_and_cannot_leave() {
        let store = Arc::new(MemoryDocumentStore::new());
        let svc = service(store.clone());
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let group_id = svc.create_group(&alice, NewGroup::named("Streakers")).await.unwrap();
        let code = svc.get_group(group_id).await.unwrap().invite_code;
        svc.join_group_by_invite_code(&bob, code.as_str()).await.unwrap();

        assert_eq!(
            svc.member_role(group_id, bob.user_id).await.unwrap(),
            Some(GroupMemberRole::Member)
        );
        assert!(matches!(
            svc.leave_group(&alice, group_id).await,
            Err(GroupError::CreatorCannotLeave)
        ));
        svc.leave_group(&bob, group_id).await.unwrap();
        assert!(matches!(
            svc.leave_group(&bob, group_id).await,
            Err(GroupError::NotMember)
        ));
        assert_eq!(svc.member_role(group_id, bob.user_id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn preview_reports_validity_without_writing() {
        let store = Arc::new(MemoryDocumentStore::new());
        let svc = service(store.clone());
        let alice = seed_user(&store, "alice").await;
        let group_id = svc.create_group(&alice, NewGroup::named("Streakers")).await.unwrap();
        let code = svc.get_group(group_id).await.unwrap().invite_code;

        let before = store.scan("").await;
        let preview = svc
            .preview_group_by_invite_code(&code.as_str().to_lowercase())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(preview.group.id, group_id);
        assert_eq!(preview.validity, InviteValidity::Valid);
        assert_eq!(store.scan("").await, before);

        assert!(svc.preview_group_by_invite_code("NOPE00").await.unwrap().is_none());
        assert!(svc.preview_group_by_invite_code("bad code").await.unwrap().is_none());

        svc.generate_new_invite_code(&alice, group_id, InviteCodeOptions::default())
            .await
            .unwrap();
        let old = svc.preview_group_by_invite_code(code.as_str()).await.unwrap().unwrap();
        assert_eq!(old.validity, InviteValidity::Inactive);
    }

    #[tokio::test]
    async fn leaderboard_orders_by_total_logs() {
        let store = Arc::new(MemoryDocumentStore::new());
        let svc = service(store.clone());
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;
        let group_id = svc.create_group(&alice, NewGroup::named("Streakers")).await.unwrap();
        let code = svc.get_group(group_id).await.unwrap().invite_code;
        svc.join_group_by_invite_code(&bob, code.as_str()).await.unwrap();

        let mut batch = WriteBatch::new();
        batch.update(
            paths::member(group_id, bob.user_id),
            vec![FieldWrite::increment("stats.totalLogs", 3)],
        );
        store.commit(batch).await.unwrap();

        let members = svc.list_members(group_id).await.unwrap();
        assert_eq!(members[0].user_id, alice.user_id);
        let board = svc.leaderboard(group_id).await.unwrap();
        assert_eq!(board[0].user_id, bob.user_id);
        assert_eq!(board[0].stats.total_logs, 3);

        assert!(matches!(
            svc.list_members(GroupId::new_v4()).await,
            Err(GroupError::GroupNotFound)
        ));
    }

    #[tokio::test]
    async fn repair_rewrites_stale_references() {
        let store = Arc::new(MemoryDocumentStore::new());
        let svc = service(store.clone());
        let alice = seed_user(&store, "alice").await;
        let group_id = svc.create_group(&alice, NewGroup::named("Streakers")).await.unwrap();
        let ghost = GroupId::new_v4();

        let mut batch = WriteBatch::new();
        batch.update(
            paths::user(alice.user_id),
            vec![FieldWrite::set("groups", serde_json::json!([ghost.to_string()]))],
        );
        store.commit(batch).await.unwrap();

        let report = svc.repair_group_references(alice.user_id).await.unwrap();
        assert_eq!(report.removed, vec![ghost]);
        assert_eq!(report.added, vec![group_id]);

        let profile: UserProfile = store
            .get(&paths::user(alice.user_id))
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(profile.groups, vec![group_id]);
        assert!(svc.repair_group_references(alice.user_id).await.unwrap().is_noop());
    }

    #[derive(Default)]
    struct RecordingRepair(std::sync::Mutex<Vec<UserId>>);

    impl RepairScheduler for RecordingRepair {
        fn schedule(&self, user_id: UserId) {
            self.0.lock().unwrap().push(user_id);
        }
    }

    #[tokio::test]
    async fn duplicate_references_are_listed_once_and_repaired() {
        let store = Arc::new(MemoryDocumentStore::new());
        let repair = Arc::new(RecordingRepair::default());
        let svc = RealGroupService::new(store.clone(), Arc::new(NanoidCodeGenerator::default()), repair.clone());
        let alice = seed_user(&store, "alice").await;
        let group_id = svc.create_group(&alice, NewGroup::named("Streakers")).await.unwrap();

        let listed = svc.list_groups_for_user(alice.user_id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(repair.0.lock().unwrap().is_empty());

        let mut batch = WriteBatch::new();
        batch.update(
            paths::user(alice.user_id),
            vec![FieldWrite::set(
                "groups",
                serde_json::json!([group_id.to_string(), group_id.to_string()]),
            )],
        );
        store.commit(batch).await.unwrap();

        let listed: Vec<GroupId> = svc
            .list_groups_for_user(alice.user_id)
            .await
            .unwrap()
            .iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(listed, vec![group_id]);
        assert_eq!(*repair.0.lock().unwrap(), vec![alice.user_id]);

        let report = svc.repair_group_references(alice.user_id).await.unwrap();
        assert!(report.is_noop());
        let profile: UserProfile = store
            .get(&paths::user(alice.user_id))
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(profile.groups, vec![group_id]);
    }
}
