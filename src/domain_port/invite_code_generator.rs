use crate::domain_model::InviteCode;

pub trait InviteCodeGenerator: Send + Sync {
    fn generate(&self) -> InviteCode;
}
