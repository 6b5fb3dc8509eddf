use crate::domain_port::*;
use crate::infra::{StoredDocument, apply_batch};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    docs: BTreeMap<DocumentPath, StoredDocument>,
    seq: u64,
}

/// In-process document store. Commits are serialized behind one lock; every
/// written document takes the next value of a store-wide sequence as its
/// version, so a deleted and recreated document never reuses a version.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: RwLock<State>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.docs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every document whose path starts with `prefix`, at any depth.
    pub async fn scan(&self, prefix: &str) -> Vec<Snapshot> {
        let state = self.state.read().await;
        state
            .docs
            .iter()
            .filter(|(path, _)| path.as_str().starts_with(prefix))
            .map(|(path, doc)| snapshot(path, doc))
            .collect()
    }
}

fn snapshot(path: &DocumentPath, doc: &StoredDocument) -> Snapshot {
    Snapshot {
        path: path.clone(),
        version: doc.version,
        data: doc.data.clone(),
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Snapshot>, StoreError> {
        let state = self.state.read().await;
        Ok(state.docs.get(path).map(|doc| snapshot(path, doc)))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .docs
            .iter()
            .filter(|(path, _)| path.parent() == collection)
            .map(|(path, doc)| snapshot(path, doc))
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut state = self.state.write().await;

        let mut staged: BTreeMap<DocumentPath, Option<StoredDocument>> = batch
            .touched_paths()
            .into_iter()
            .map(|path| {
                let doc = state.docs.get(&path).cloned();
                (path, doc)
            })
            .collect();

        let mut seq = state.seq;
        let written = apply_batch(&batch, &mut staged, |_| {
            seq += 1;
            seq
        })?;
        state.seq = seq;

        for path in written {
            match staged.remove(&path).flatten() {
                Some(doc) => {
                    state.docs.insert(path, doc);
                }
                None => {
                    state.docs.remove(&path);
                }
            }
        }

        tracing::trace!(ops = batch.ops().len(), seq = state.seq, "memory batch committed");
        Ok(())
    }
}
