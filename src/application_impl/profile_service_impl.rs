use super::optimistic::load;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub struct RealProfileService {
    store: Arc<dyn DocumentStore>,
}

impl RealProfileService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        RealProfileService { store }
    }
}

#[async_trait::async_trait]
impl ProfileService for RealProfileService {
    async fn register_profile(&self, caller: &Caller, profile: NewProfile) -> Result<UserProfile, GroupError> {
        profile.validate()?;
        let display_name = profile.display_name.trim();
        if display_name.is_empty() {
            return Err(GroupError::Validation("display name is required".to_owned()));
        }

        let path = paths::user(caller.user_id);
        if let Some((_, existing)) = load::<UserProfile>(self.store.as_ref(), &path).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let defaults = UserSettings::default();
        let created = UserProfile {
            id: caller.user_id,
            email: caller.email.clone(),
            display_name: display_name.to_owned(),
            created_at: now,
            last_active: now,
            settings: UserSettings {
                default_privacy: profile.default_privacy.unwrap_or(defaults.default_privacy),
                notifications: defaults.notifications,
                timezone: profile.timezone.unwrap_or(defaults.timezone),
            },
            stats: UserStats::default(),
            groups: Vec::new(),
        };

        let mut batch = WriteBatch::new();
        batch.create(path.clone(), &created)?;
        match self.store.commit(batch).await {
            Ok(()) => {
                info!(user_id = %caller.user_id, "profile registered");
                Ok(created)
            }
            // Lost a race with a concurrent registration.
            Err(StoreError::Conflict(_)) => self.get_profile(caller.user_id).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn get_profile(&self, user_id: UserId) -> Result<UserProfile, GroupError> {
        load::<UserProfile>(self.store.as_ref(), &paths::user(user_id))
            .await?
            .map(|(_, profile)| profile)
            .ok_or(GroupError::UserNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryDocumentStore;

    fn caller() -> Caller {
        Caller {
            user_id: UserId(uuid::Uuid::new_v4()),
            email: "alice@example.com".to_owned(),
        }
    }

    fn named(name: &str) -> NewProfile {
        NewProfile {
            display_name: name.to_owned(),
            timezone: Some("Europe/Berlin".to_owned()),
            default_privacy: Some(false),
        }
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let svc = RealProfileService::new(Arc::new(MemoryDocumentStore::new()));
        let alice = caller();

        let first = svc.register_profile(&alice, named(" Alice ")).await.unwrap();
        assert_eq!(first.display_name, "Alice");
        assert_eq!(first.settings.timezone, "Europe/Berlin");
        assert!(!first.settings.default_privacy);

        let second = svc.register_profile(&alice, named("Someone Else")).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(svc.get_profile(alice.user_id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn validates_display_name() {
        let svc = RealProfileService::new(Arc::new(MemoryDocumentStore::new()));
        assert!(matches!(
            svc.register_profile(&caller(), named(&"x".repeat(31))).await,
            Err(GroupError::Validation(_))
        ));
        assert!(matches!(
            svc.get_profile(caller().user_id).await,
            Err(GroupError::UserNotFound)
        ));
    }
}
