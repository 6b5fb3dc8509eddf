use crate::application_port::GroupError;
use crate::domain_model::*;

pub const DEFAULT_LOG_LIMIT: usize = 50;
pub const MAX_LOG_LIMIT: usize = 500;

#[async_trait::async_trait]
pub trait LogService: Send + Sync {
    async fn append_log(&self, caller: &Caller, entry: NewLogEntry) -> Result<LogEntry, GroupError>;
    async fn list_logs(&self, caller: &Caller, limit: Option<usize>) -> Result<Vec<LogEntry>, GroupError>;
}
