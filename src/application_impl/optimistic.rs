use crate::application_port::GroupError;
use crate::domain_port::*;
use serde::de::DeserializeOwned;

/// Result of one read-validate-commit round.
pub(crate) enum Attempt<T> {
    Done(T),
    /// A precondition failed at commit time; re-read and try again.
    Conflicted,
}

pub(crate) async fn load<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &DocumentPath,
) -> Result<Option<(Snapshot, T)>, GroupError> {
    match store.get(path).await? {
        Some(snapshot) => {
            let doc = snapshot.decode()?;
            Ok(Some((snapshot, doc)))
        }
        None => Ok(None),
    }
}

pub(crate) async fn load_all<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Vec<T>, GroupError> {
    let snapshots = store.list(collection).await?;
    snapshots
        .iter()
        .map(|s| s.decode().map_err(GroupError::from))
        .collect()
}

pub(crate) async fn commit<T>(store: &dyn DocumentStore, batch: WriteBatch, value: T) -> Result<Attempt<T>, GroupError> {
    match store.commit(batch).await {
        Ok(()) => Ok(Attempt::Done(value)),
        Err(StoreError::Conflict(path)) => {
            tracing::debug!(%path, "commit conflicted");
            Ok(Attempt::Conflicted)
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn exhausted(operation: &str, attempts: usize) -> GroupError {
    tracing::warn!(operation, attempts, "gave up after repeated write conflicts");
    GroupError::StoreUnavailable(format!("{operation}: too much contention, try again"))
}
