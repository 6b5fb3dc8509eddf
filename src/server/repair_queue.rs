use crate::application_port::GroupService;
use crate::domain_model::UserId;
use crate::domain_port::RepairScheduler;
use dashmap::DashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const REPAIR_QUEUE_CAPACITY: usize = 1024;

/// Sending half: deduplicates users already waiting for a repair.
pub struct RepairQueue {
    tx: mpsc::Sender<UserId>,
    pending: Arc<DashSet<UserId>>,
}

pub struct RepairWorker {
    rx: mpsc::Receiver<UserId>,
    pending: Arc<DashSet<UserId>>,
    cancellation_token: CancellationToken,
}

impl RepairQueue {
    pub fn new(cancellation_token: CancellationToken) -> (Self, RepairWorker) {
        let (tx, rx) = mpsc::channel(REPAIR_QUEUE_CAPACITY);
        let pending = Arc::new(DashSet::new());
        (
            RepairQueue {
                tx,
                pending: pending.clone(),
            },
            RepairWorker {
                rx,
                pending,
                cancellation_token,
            },
        )
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl RepairScheduler for RepairQueue {
    fn schedule(&self, user_id: UserId) {
        if !self.pending.insert(user_id) {
            return;
        }
        if let Err(e) = self.tx.try_send(user_id) {
            self.pending.remove(&user_id);
            tracing::warn!(%user_id, "repair not queued: {e}");
        }
    }
}

impl RepairWorker {
    pub async fn run(mut self, groups: Arc<dyn GroupService>) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => {
                    tracing::info!("repair worker shutting down...");
                    break;
                }
                next = self.rx.recv() => {
                    let Some(user_id) = next else { break };
                    // Cleared first so a reference that goes stale mid-repair is queued again.
                    self.pending.remove(&user_id);
                    match groups.repair_group_references(user_id).await {
                        Ok(report) => tracing::debug!(%user_id, ?report, "repair finished"),
                        Err(e) => tracing::error!(%user_id, "repair failed: {e}"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::{NanoidCodeGenerator, RealGroupService};
    use crate::domain_model::*;
    use crate::domain_port::*;
    use crate::infra_memory::MemoryDocumentStore;
    use chrono::Utc;
    use std::time::Duration;

    #[tokio::test]
    async fn stale_reference_is_repaired_in_background() {
        let store = Arc::new(MemoryDocumentStore::new());
        let cancel = CancellationToken::new();
        let (queue, worker) = RepairQueue::new(cancel.clone());
        let queue = Arc::new(queue);
        let groups: Arc<dyn GroupService> = Arc::new(RealGroupService::new(
            store.clone(),
            Arc::new(NanoidCodeGenerator::default()),
            queue.clone(),
        ));
        let handle = tokio::spawn(worker.run(groups.clone()));

        let user_id = UserId(uuid::Uuid::new_v4());
        let now = Utc::now();
        let profile = UserProfile {
            id: user_id,
            email: "alice@example.com".to_owned(),
            display_name: "alice".to_owned(),
            created_at: now,
            last_active: now,
            settings: UserSettings::default(),
            stats: UserStats::default(),
            groups: vec![GroupId::new_v4()],
        };
        let mut batch = WriteBatch::new();
        batch.set(paths::user(user_id), &profile).unwrap();
        store.commit(batch).await.unwrap();

        assert!(groups.list_groups_for_user(user_id).await.unwrap().is_empty());

        let mut repaired = false;
        for _ in 0..100 {
            let stored: UserProfile = store.get(&paths::user(user_id)).await.unwrap().unwrap().decode().unwrap();
            if stored.groups.is_empty() {
                repaired = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(repaired);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn duplicate_schedules_are_collapsed() {
        let (queue, mut worker) = RepairQueue::new(CancellationToken::new());
        let user_id = UserId(uuid::Uuid::new_v4());
        queue.schedule(user_id);
        queue.schedule(user_id);
        assert_eq!(queue.pending(), 1);
        assert_eq!(worker.rx.recv().await, Some(user_id));
        assert!(worker.rx.try_recv().is_err());
    }
}
