use crate::domain_model::UserId;

/// Accepts users whose cached group list was found stale. Implementations
/// must not block the caller.
pub trait RepairScheduler: Send + Sync {
    fn schedule(&self, user_id: UserId);
}

#[derive(Debug, Default)]
pub struct NoRepair;

impl RepairScheduler for NoRepair {
    fn schedule(&self, _user_id: UserId) {}
}
