use super::util::store_error;
use crate::domain_port::*;
use crate::infra::{StoredDocument, apply_batch};
use sqlx::{MySqlConnection, MySqlPool, Row};
use std::collections::BTreeMap;

/// Document store over a single MySQL table. Each batch runs in one
/// transaction that locks every touched row (in path order) before the
/// preconditions are checked.
pub struct MySqlDocumentStore {
    pool: MySqlPool,
}

impl MySqlDocumentStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlDocumentStore { pool }
    }

    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let pool = MySqlPool::connect(dsn)
            .await
            .map_err(|e| store_error("connect", e))?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS document (
    path    VARCHAR(512) NOT NULL PRIMARY KEY,
    parent  VARCHAR(512) NOT NULL,
    body    MEDIUMTEXT   NOT NULL,
    version BIGINT UNSIGNED NOT NULL,
    INDEX idx_document_parent (parent)
)
"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("create document table", e))?;

        Ok(())
    }

    async fn lock_row(
        conn: &mut MySqlConnection,
        path: &DocumentPath,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let row = sqlx::query("SELECT body, version FROM document WHERE path = ? FOR UPDATE")
            .bind(path.as_str())
            .fetch_optional(conn)
            .await
            .map_err(|e| store_error("lock document", e))?;

        row.map(|row| decode_row(path, &row)).transpose()
    }
}

fn decode_row(path: &DocumentPath, row: &sqlx::mysql::MySqlRow) -> Result<StoredDocument, StoreError> {
    let body: String = row.get("body");
    let version: u64 = row.get("version");
    let data = serde_json::from_str(&body)
        .map_err(|e| StoreError::Corrupt(format!("{path}: {e}")))?;
    Ok(StoredDocument { version, data })
}

#[async_trait::async_trait]
impl DocumentStore for MySqlDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Snapshot>, StoreError> {
        let row = sqlx::query("SELECT body, version FROM document WHERE path = ?")
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("get document", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let doc = decode_row(path, &row)?;
        Ok(Some(Snapshot {
            path: path.clone(),
            version: doc.version,
            data: doc.data,
        }))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Snapshot>, StoreError> {
        let rows = sqlx::query("SELECT path, body, version FROM document WHERE parent = ? ORDER BY path")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("list documents", e))?;

        rows.iter()
            .map(|row| {
                let path = DocumentPath::parse(row.get::<&str, _>("path"));
                let doc = decode_row(&path, row)?;
                Ok(Snapshot {
                    path,
                    version: doc.version,
                    data: doc.data,
                })
            })
            .collect()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("begin", e))?;

        let mut staged = BTreeMap::new();
        for path in batch.touched_paths() {
            let doc = Self::lock_row(tx.as_mut(), &path).await?;
            staged.insert(path, doc);
        }

        // Dropping `tx` on error rolls it back.
        let written = apply_batch(&batch, &mut staged, |previous| previous.unwrap_or(0) + 1)?;

        for path in written {
            match staged.get(&path).and_then(|doc| doc.as_ref()) {
                Some(doc) => {
                    sqlx::query(
                        r#"
INSERT INTO document (path, parent, body, version)
VALUES (?, ?, ?, ?)
ON DUPLICATE KEY UPDATE body = VALUES(body), version = VALUES(version)
"#,
                    )
                    .bind(path.as_str())
                    .bind(path.parent())
                    .bind(doc.data.to_string())
                    .bind(doc.version)
                    .execute(tx.as_mut())
                    .await
                    .map_err(|e| store_error("write document", e))?;
                }
                None => {
                    sqlx::query("DELETE FROM document WHERE path = ?")
                        .bind(path.as_str())
                        .execute(tx.as_mut())
                        .await
                        .map_err(|e| store_error("delete document", e))?;
                }
            }
        }

        tx.commit().await.map_err(|e| store_error("commit", e))?;
        Ok(())
    }
}
