use crate::domain_port::{DocumentPath, Snapshot, WriteBatch};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A precondition failed or a created document already exists.
    #[error("write conflict on {0}")]
    Conflict(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt document: {0}")]
    Corrupt(String),
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Snapshot>, StoreError>;

    /// Direct children of a collection, ordered by path.
    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, StoreError>;

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
