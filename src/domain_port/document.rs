use crate::domain_port::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Slash-separated path of a document: `collection/id[/collection/id...]`.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_owned())
            .collect::<Vec<_>>()
            .join("/");
        DocumentPath(joined)
    }

    pub fn parse(raw: &str) -> Self {
        DocumentPath(raw.trim_matches('/').to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The collection this document lives in.
    pub fn parent(&self) -> &str {
        self.0.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
    }

    pub fn id(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, id)| id).unwrap_or(&self.0)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as read from the store. `version` changes on every committed write.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub path: DocumentPath,
    pub version: u64,
    pub data: Value,
}

impl Snapshot {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| StoreError::Corrupt(format!("decode {}: {e}", self.path)))
    }
}

pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt(format!("encode: {e}")))
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    /// Missing fields count as zero.
    Increment(i64),
    /// Appends each element not already present.
    ArrayUnion(Vec<Value>),
    /// Removes every element equal to one of these.
    ArrayRemove(Vec<Value>),
    Remove,
}

/// A write to one field, addressed with a dotted path such as `stats.memberCount`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub field: String,
    pub op: FieldOp,
}

impl FieldWrite {
    pub fn set(field: &str, value: Value) -> Self {
        FieldWrite {
            field: field.to_owned(),
            op: FieldOp::Set(value),
        }
    }

    pub fn increment(field: &str, delta: i64) -> Self {
        FieldWrite {
            field: field.to_owned(),
            op: FieldOp::Increment(delta),
        }
    }

    pub fn array_union(field: &str, values: Vec<Value>) -> Self {
        FieldWrite {
            field: field.to_owned(),
            op: FieldOp::ArrayUnion(values),
        }
    }

    pub fn array_remove(field: &str, values: Vec<Value>) -> Self {
        FieldWrite {
            field: field.to_owned(),
            op: FieldOp::ArrayRemove(values),
        }
    }

    pub fn remove(field: &str) -> Self {
        FieldWrite {
            field: field.to_owned(),
            op: FieldOp::Remove,
        }
    }
}

/// What an update does when its document does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingDocument {
    Fail,
    Skip,
    Create,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        path: DocumentPath,
        data: Value,
    },
    /// Fails the batch with `Conflict` when the document already exists.
    Create {
        path: DocumentPath,
        data: Value,
    },
    Update {
        path: DocumentPath,
        fields: Vec<FieldWrite>,
        missing: MissingDocument,
    },
    Delete {
        path: DocumentPath,
    },
}

impl WriteOp {
    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteOp::Set { path, .. }
            | WriteOp::Create { path, .. }
            | WriteOp::Update { path, .. }
            | WriteOp::Delete { path } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    Version(u64),
    Exists,
}

/// Writes applied all-or-nothing by `DocumentStore::commit`. Preconditions are
/// checked against the stored state before any write is applied; a failed
/// precondition rejects the whole batch with `StoreError::Conflict`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
    preconditions: Vec<(DocumentPath, Precondition)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<T: Serialize>(&mut self, path: DocumentPath, doc: &T) -> Result<&mut Self, StoreError> {
        let data = to_value(doc)?;
        self.ops.push(WriteOp::Set { path, data });
        Ok(self)
    }

    pub fn create<T: Serialize>(&mut self, path: DocumentPath, doc: &T) -> Result<&mut Self, StoreError> {
        let data = to_value(doc)?;
        self.ops.push(WriteOp::Create { path, data });
        Ok(self)
    }

    pub fn update(&mut self, path: DocumentPath, fields: Vec<FieldWrite>) -> &mut Self {
        self.ops.push(WriteOp::Update {
            path,
            fields,
            missing: MissingDocument::Fail,
        });
        self
    }

    pub fn update_existing(&mut self, path: DocumentPath, fields: Vec<FieldWrite>) -> &mut Self {
        self.ops.push(WriteOp::Update {
            path,
            fields,
            missing: MissingDocument::Skip,
        });
        self
    }

    pub fn merge(&mut self, path: DocumentPath, fields: Vec<FieldWrite>) -> &mut Self {
        self.ops.push(WriteOp::Update {
            path,
            fields,
            missing: MissingDocument::Create,
        });
        self
    }

    pub fn delete(&mut self, path: DocumentPath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    pub fn expect(&mut self, path: DocumentPath, precondition: Precondition) -> &mut Self {
        self.preconditions.push((path, precondition));
        self
    }

    pub fn expect_version(&mut self, snapshot: &Snapshot) -> &mut Self {
        self.expect(snapshot.path.clone(), Precondition::Version(snapshot.version))
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn preconditions(&self) -> &[(DocumentPath, Precondition)] {
        &self.preconditions
    }

    /// No writes and nothing to check.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.preconditions.is_empty()
    }

    /// Every path read or written by the batch, sorted.
    pub fn touched_paths(&self) -> BTreeSet<DocumentPath> {
        self.ops
            .iter()
            .map(|op| op.path().clone())
            .chain(self.preconditions.iter().map(|(path, _)| path.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_parts() {
        let path = DocumentPath::from_segments(["groups", "g1", "members", "u1"]);
        assert_eq!(path.as_str(), "groups/g1/members/u1");
        assert_eq!(path.parent(), "groups/g1/members");
        assert_eq!(path.id(), "u1");
        assert_eq!(DocumentPath::parse("/users/u1/").as_str(), "users/u1");
    }

    #[test]
    fn touched_paths_cover_ops_and_preconditions() {
        let mut batch = WriteBatch::new();
        batch
            .delete(DocumentPath::parse("b/1"))
            .update(DocumentPath::parse("a/1"), vec![FieldWrite::increment("n", 1)])
            .expect(DocumentPath::parse("c/1"), Precondition::Exists);
        let touched: Vec<_> = batch.touched_paths().into_iter().map(|p| p.to_string()).collect();
        assert_eq!(touched, vec!["a/1", "b/1", "c/1"]);
        assert!(!batch.is_empty());
        assert!(WriteBatch::new().is_empty());
    }
}
