use super::optimistic::{Attempt, commit, exhausted, load, load_all};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub struct RealLogService {
    store: Arc<dyn DocumentStore>,
    max_commit_attempts: usize,
}

impl RealLogService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        RealLogService {
            store,
            max_commit_attempts: super::DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }

    pub fn with_max_commit_attempts(mut self, attempts: usize) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    /// Groups from `requested` that exist and list the caller as a member.
    async fn member_groups(&self, user_id: UserId, requested: &[GroupId]) -> Result<Vec<GroupId>, GroupError> {
        let mut groups = Vec::new();
        for group_id in requested {
            if groups.contains(group_id) {
                continue;
            }
            if let Some((_, group)) = load::<Group>(self.store.as_ref(), &paths::group(*group_id)).await? {
                if group.is_member(user_id) {
                    groups.push(*group_id);
                }
            }
        }
        Ok(groups)
    }

    async fn try_append(
        &self,
        caller: &Caller,
        entry: &NewLogEntry,
        timestamp: DateTime<Utc>,
    ) -> Result<Attempt<LogEntry>, GroupError> {
        let (user_snapshot, profile) = load::<UserProfile>(self.store.as_ref(), &paths::user(caller.user_id))
            .await?
            .ok_or(GroupError::AuthenticationRequired)?;
        let groups = self.member_groups(caller.user_id, &entry.groups).await?;

        let now = Utc::now();
        let keys = PeriodKeys::of(timestamp);
        let log = LogEntry {
            id: LogId(uuid::Uuid::new_v4()),
            user_id: caller.user_id,
            timestamp,
            is_public: entry.is_public,
            created_at: now,
            day_key: keys.day_key.clone(),
            week_key: keys.week_key,
            month_key: keys.month_key,
            groups: groups.clone(),
        };

        let day = timestamp.date_naive();
        let (current_streak, longest_streak) = profile.stats.streak_after(day);
        let last_log_day = profile.stats.last_log_day.map_or(day, |last| last.max(day));
        let public = i64::from(entry.is_public);

        let mut user_fields = vec![
            FieldWrite::increment("stats.totalLogs", 1),
            FieldWrite::increment("stats.publicLogs", public),
            FieldWrite::set("stats.currentStreak", Value::from(current_streak)),
            FieldWrite::set("stats.longestStreak", Value::from(longest_streak)),
            FieldWrite::set("stats.lastLogDay", to_value(&last_log_day)?),
            FieldWrite::set("lastActive", to_value(&now)?),
        ];
        if profile.stats.first_log_date.is_none_or(|first| timestamp < first) {
            user_fields.push(FieldWrite::set("stats.firstLogDate", to_value(&timestamp)?));
        }

        let mut daily_fields = vec![
            FieldWrite::set("date", Value::from(keys.day_key.as_str())),
            FieldWrite::set("userId", Value::from(caller.user_id.to_string())),
            FieldWrite::increment("totalLogs", 1),
            FieldWrite::increment("publicLogs", public),
            FieldWrite::array_union("timestamps", vec![to_value(&timestamp)?]),
        ];

        let mut batch = WriteBatch::new();
        batch.create(paths::log(caller.user_id, log.id), &log)?;
        batch
            .update(paths::user(caller.user_id), user_fields)
            .expect_version(&user_snapshot);

        if entry.is_public {
            for group_id in &groups {
                daily_fields.push(FieldWrite::increment(&format!("groups.{group_id}.logs"), 1));
                batch
                    .update_existing(
                        paths::group(*group_id),
                        vec![
                            FieldWrite::increment("stats.totalLogs", 1),
                            FieldWrite::set("stats.lastActivity", to_value(&now)?),
                        ],
                    )
                    .update_existing(
                        paths::member(*group_id, caller.user_id),
                        vec![
                            FieldWrite::increment("stats.totalLogs", 1),
                            FieldWrite::set("stats.currentStreak", Value::from(current_streak)),
                            FieldWrite::set("stats.longestStreak", Value::from(longest_streak)),
                            FieldWrite::set("lastActivity", to_value(&now)?),
                        ],
                    );
            }
        }
        batch.merge(paths::daily_stats(caller.user_id, &keys.day_key), daily_fields);

        commit(self.store.as_ref(), batch, log).await
    }
}

#[async_trait::async_trait]
impl LogService for RealLogService {
    async fn append_log(&self, caller: &Caller, entry: NewLogEntry) -> Result<LogEntry, GroupError> {
        let timestamp = entry.timestamp.unwrap_or_else(Utc::now);

        for attempt in 1..=self.max_commit_attempts {
            match self.try_append(caller, &entry, timestamp).await? {
                Attempt::Done(log) => {
                    info!(user_id = %caller.user_id, log_id = %log.id, public = log.is_public, "log appended");
                    return Ok(log);
                }
                Attempt::Conflicted => debug!(attempt, "append_log conflicted, retrying"),
            }
        }
        Err(exhausted("append_log", self.max_commit_attempts))
    }

    async fn list_logs(&self, caller: &Caller, limit: Option<usize>) -> Result<Vec<LogEntry>, GroupError> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
        let mut logs: Vec<LogEntry> = load_all(self.store.as_ref(), &paths::logs(caller.user_id)).await?;
        logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        logs.truncate(limit);
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{NanoidCodeGenerator, RealGroupService, RealProfileService};
    use crate::infra_memory::MemoryDocumentStore;

    struct Fixture {
        store: Arc<MemoryDocumentStore>,
        logs: RealLogService,
        groups: RealGroupService,
        profiles: RealProfileService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryDocumentStore::new());
        Fixture {
            logs: RealLogService::new(store.clone()),
            groups: RealGroupService::new(store.clone(), Arc::new(NanoidCodeGenerator::default()), Arc::new(NoRepair)),
            profiles: RealProfileService::new(store.clone()),
            store,
        }
    }

    async fn register(f: &Fixture, name: &str) -> Caller {
        let caller = Caller {
            user_id: UserId(uuid::Uuid::new_v4()),
            email: format!("{name}@example.com"),
        };
        f.profiles
            .register_profile(
                &caller,
                NewProfile {
                    display_name: name.to_owned(),
                    timezone: None,
                    default_privacy: None,
                },
            )
            .await
            .unwrap();
        caller
    }

    fn at(ts: &str, is_public: bool, groups: Vec<GroupId>) -> NewLogEntry {
        NewLogEntry {
            timestamp: Some(ts.parse().unwrap()),
            is_public,
            groups,
        }
    }

    #[tokio::test]
    async fn streaks_and_daily_stats() {
        let f = fixture();
        let alice = register(&f, "alice").await;

        f.logs.append_log(&alice, at("2024-03-01T08:00:00Z", false, vec![])).await.unwrap();
        f.logs.append_log(&alice, at("2024-03-01T20:00:00Z", true, vec![])).await.unwrap();
        f.logs.append_log(&alice, at("2024-03-02T08:00:00Z", true, vec![])).await.unwrap();

        let profile = f.profiles.get_profile(alice.user_id).await.unwrap();
        assert_eq!(profile.stats.total_logs, 3);
        assert_eq!(profile.stats.public_logs, 2);
        assert_eq!(profile.stats.current_streak, 2);
        assert_eq!(profile.stats.longest_streak, 2);

        f.logs.append_log(&alice, at("2024-03-05T08:00:00Z", false, vec![])).await.unwrap();
        let profile = f.profiles.get_profile(alice.user_id).await.unwrap();
        assert_eq!(profile.stats.current_streak, 1);
        assert_eq!(profile.stats.longest_streak, 2);

        let daily = f
            .store
            .get(&paths::daily_stats(alice.user_id, "2024-03-01"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(daily.data["totalLogs"], 2);
        assert_eq!(daily.data["publicLogs"], 1);
        assert_eq!(daily.data["timestamps"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn public_logs_count_towards_member_groups_only() {
        let f = fixture();
        let alice = register(&f, "alice").await;
        let bob = register(&f, "bob").await;
        let mine = f.groups.create_group(&alice, NewGroup::named("Mine")).await.unwrap();
        let theirs = f.groups.create_group(&bob, NewGroup::named("Theirs")).await.unwrap();

        let log = f
            .logs
            .append_log(&alice, at("2024-03-01T08:00:00Z", true, vec![mine, theirs]))
            .await
            .unwrap();
        assert_eq!(log.groups, vec![mine]);

        assert_eq!(f.groups.get_group(mine).await.unwrap().stats.total_logs, 1);
        assert_eq!(f.groups.get_group(theirs).await.unwrap().stats.total_logs, 0);
        let board = f.groups.leaderboard(mine).await.unwrap();
        assert_eq!(board[0].stats.total_logs, 1);
        assert_eq!(board[0].stats.current_streak, 1);

        f.logs
            .append_log(&alice, at("2024-03-02T08:00:00Z", false, vec![mine]))
            .await
            .unwrap();
        assert_eq!(f.groups.get_group(mine).await.unwrap().stats.total_logs, 1);
    }

    #[tokio::test]
    async fn membership_totals_only_count_logs_tagged_to_that_group() {
        let f = fixture();
        let alice = register(&f, "alice").await;
        let bob = register(&f, "bob").await;
        let first = f.groups.create_group(&alice, NewGroup::named("First")).await.unwrap();
        let second = f.groups.create_group(&alice, NewGroup::named("Second")).await.unwrap();
        for group_id in [first, second] {
            let code = f.groups.get_group(group_id).await.unwrap().invite_code;
            f.groups.join_group_by_invite_code(&bob, code.as_str()).await.unwrap();
        }

        for day in 1..=5 {
            f.logs
                .append_log(&bob, at(&format!("2024-03-0{day}T08:00:00Z"), true, vec![second]))
                .await
                .unwrap();
        }
        f.logs
            .append_log(&bob, at("2024-03-06T08:00:00Z", true, vec![first]))
            .await
            .unwrap();

        let bob_in = |board: Vec<Membership>| board.into_iter().find(|m| m.user_id == bob.user_id).unwrap();
        let in_first = bob_in(f.groups.leaderboard(first).await.unwrap());
        let in_second = bob_in(f.groups.leaderboard(second).await.unwrap());
        assert_eq!(in_first.stats.total_logs, 1);
        assert_eq!(in_first.stats.current_streak, 6);
        assert_eq!(in_second.stats.total_logs, 5);
        assert_eq!(in_second.stats.current_streak, 5);
        assert_eq!(f.groups.get_group(first).await.unwrap().stats.total_logs, 1);
        assert_eq!(f.groups.get_group(second).await.unwrap().stats.total_logs, 5);
    }

    #[tokio::test]
    async fn list_logs_is_newest_first_and_limited() {
        let f = fixture();
        let alice = register(&f, "alice").await;
        for day in 1..=5 {
            f.logs
                .append_log(&alice, at(&format!("2024-03-0{day}T08:00:00Z"), false, vec![]))
                .await
                .unwrap();
        }

        let logs = f.logs.list_logs(&alice, Some(2)).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].day_key, "2024-03-05");
        assert_eq!(logs[1].day_key, "2024-03-04");
        assert_eq!(f.logs.list_logs(&alice, None).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unknown_caller_cannot_log() {
        let f = fixture();
        let ghost = Caller {
            user_id: UserId(uuid::Uuid::new_v4()),
            email: "ghost@example.com".to_owned(),
        };
        assert!(matches!(
            f.logs.append_log(&ghost, NewLogEntry::default()).await,
            Err(GroupError::AuthenticationRequired)
        ));
    }
}
