use crate::domain_port::*;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub version: u64,
    pub data: Value,
}

/// Applies `batch` to `docs`, which must hold an entry (present or `None`)
/// for every touched path, and returns the paths that were written. On error
/// `docs` is left in an unspecified state and must be discarded.
/// `next_version` receives the previous version of a written document and
/// returns its new one.
pub fn apply_batch(
    batch: &WriteBatch,
    docs: &mut BTreeMap<DocumentPath, Option<StoredDocument>>,
    mut next_version: impl FnMut(Option<u64>) -> u64,
) -> Result<BTreeSet<DocumentPath>, StoreError> {
    for (path, precondition) in batch.preconditions() {
        let current = docs.get(path).and_then(|d| d.as_ref());
        let holds = match (precondition, current) {
            (Precondition::Version(expected), Some(doc)) => doc.version == *expected,
            (Precondition::Version(_), None) => false,
            (Precondition::Exists, current) => current.is_some(),
        };
        if !holds {
            return Err(StoreError::Conflict(path.to_string()));
        }
    }

    let original_versions: BTreeMap<DocumentPath, Option<u64>> = docs
        .iter()
        .map(|(path, doc)| (path.clone(), doc.as_ref().map(|d| d.version)))
        .collect();
    let mut written = BTreeSet::new();

    for op in batch.ops() {
        let path = op.path();
        let slot = docs
            .get_mut(path)
            .ok_or_else(|| StoreError::Unavailable(format!("{path} was not loaded")))?;
        match op {
            WriteOp::Set { data, .. } => {
                *slot = Some(StoredDocument {
                    version: 0,
                    data: data.clone(),
                });
            }
            WriteOp::Create { data, .. } => {
                if slot.is_some() {
                    return Err(StoreError::Conflict(path.to_string()));
                }
                *slot = Some(StoredDocument {
                    version: 0,
                    data: data.clone(),
                });
            }
            WriteOp::Update { fields, missing, .. } => {
                if slot.is_none() {
                    match missing {
                        MissingDocument::Fail => return Err(StoreError::NotFound(path.to_string())),
                        MissingDocument::Skip => continue,
                        MissingDocument::Create => {
                            *slot = Some(StoredDocument {
                                version: 0,
                                data: Value::Object(Map::new()),
                            });
                        }
                    }
                }
                if let Some(doc) = slot.as_mut() {
                    for write in fields {
                        apply_field(&mut doc.data, write)
                            .map_err(|e| StoreError::Corrupt(format!("{path}: {e}")))?;
                    }
                }
            }
            WriteOp::Delete { .. } => {
                *slot = None;
            }
        }
        written.insert(path.clone());
    }

    for path in &written {
        if let Some(Some(doc)) = docs.get_mut(path) {
            let previous = original_versions.get(path).copied().flatten();
            doc.version = next_version(previous);
        }
    }

    Ok(written)
}

fn apply_field(data: &mut Value, write: &FieldWrite) -> Result<(), String> {
    let mut segments: Vec<&str> = write.field.split('.').collect();
    let last = segments
        .pop()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("empty field path {:?}", write.field))?;

    let mut target = data
        .as_object_mut()
        .ok_or_else(|| "document is not an object".to_owned())?;
    for segment in segments {
        let entry = target
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            if matches!(write.op, FieldOp::Remove) {
                return Ok(());
            }
            *entry = Value::Object(Map::new());
        }
        target = entry
            .as_object_mut()
            .ok_or_else(|| format!("{segment} is not an object"))?;
    }

    match &write.op {
        FieldOp::Set(value) => {
            target.insert(last.to_owned(), value.clone());
        }
        FieldOp::Increment(delta) => {
            let current = match target.get(last) {
                None | Some(Value::Null) => 0,
                Some(Value::Number(n)) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .ok_or_else(|| format!("{last} is out of range"))?,
                Some(other) => return Err(format!("{last} is not a number: {other}")),
            };
            target.insert(last.to_owned(), Value::Number(Number::from(current + delta)));
        }
        FieldOp::ArrayUnion(values) => {
            let array = array_field(target, last)?;
            for value in values {
                if !array.contains(value) {
                    array.push(value.clone());
                }
            }
        }
        FieldOp::ArrayRemove(values) => {
            let array = array_field(target, last)?;
            array.retain(|v| !values.contains(v));
        }
        FieldOp::Remove => {
            target.remove(last);
        }
    }
    Ok(())
}

fn array_field<'a>(target: &'a mut Map<String, Value>, field: &str) -> Result<&'a mut Vec<Value>, String> {
    let entry = target.entry(field.to_owned()).or_insert_with(|| Value::Array(Vec::new()));
    if entry.is_null() {
        *entry = Value::Array(Vec::new());
    }
    entry
        .as_array_mut()
        .ok_or_else(|| format!("{field} is not an array"))
}
