// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for knowledge bases, documents and embedded chunks.
//!
//! Chunk insertion and rollback each run in one transaction together with
//! the matching document status change, so a reader never sees a `ready`
//! document with missing chunks or an `error` document with leftovers.

use std::str::FromStr;

use atendente_core::AtendenteError;
use atendente_core::types::now_timestamp;
use atendente_storage::{Database, map_tr_err};
use rusqlite::{OptionalExtension, params};

use crate::types::{
    Document, DocumentStatus, KnowledgeBase, NewChunk, StoredChunk, blob_to_vec, vec_to_blob,
};

const KB_COLUMNS: &str = "id, tenant_id, name, created_at";
const DOC_COLUMNS: &str = "id, knowledge_base_id, tenant_id, title, status, error, chunk_count, created_at, updated_at";

fn row_to_knowledge_base(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeBase> {
    Ok(KnowledgeBase {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let status: String = row.get(4)?;
    let status = DocumentStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Document {
        id: row.get(0)?,
        knowledge_base_id: row.get(1)?,
        tenant_id: row.get(2)?,
        title: row.get(3)?,
        status,
        error: row.get(5)?,
        chunk_count: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Knowledge tables over the shared [`Database`].
#[derive(Clone)]
pub struct KnowledgeStore {
    db: Database,
}

impl KnowledgeStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the tenant's knowledge base called `name`, creating it if absent.
    pub async fn ensure_knowledge_base(
        &self,
        tenant_id: &str,
        name: &str,
    ) -> Result<KnowledgeBase, AtendenteError> {
        let tenant_id = tenant_id.to_string();
        let name = name.to_string();
        let new_id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO knowledge_bases (id, tenant_id, name, created_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (tenant_id, name) DO NOTHING",
                    params![new_id, tenant_id, name, now],
                )?;
                let kb = tx.query_row(
                    &format!(
                        "SELECT {KB_COLUMNS} FROM knowledge_bases WHERE tenant_id = ?1 AND name = ?2"
                    ),
                    params![tenant_id, name],
                    row_to_knowledge_base,
                )?;
                tx.commit()?;
                Ok(kb)
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn list_knowledge_bases(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<KnowledgeBase>, AtendenteError> {
        let tenant_id = tenant_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {KB_COLUMNS} FROM knowledge_bases WHERE tenant_id = ?1 ORDER BY name"
                ))?;
                let rows = stmt.query_map(params![tenant_id], row_to_knowledge_base)?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Deletes a knowledge base with its documents and chunks.
    pub async fn delete_knowledge_base(&self, id: &str) -> Result<bool, AtendenteError> {
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let deleted = conn.execute("DELETE FROM knowledge_bases WHERE id = ?1", params![id])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Registers a `pending` document under a knowledge base.
    pub async fn create_document(
        &self,
        knowledge_base_id: &str,
        title: &str,
    ) -> Result<Document, AtendenteError> {
        let kb_id = knowledge_base_id.to_string();
        let title = title.to_string();
        let id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        let created = self
            .db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let tenant: Option<String> = tx
                    .query_row(
                        "SELECT tenant_id FROM knowledge_bases WHERE id = ?1",
                        params![kb_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(tenant_id) = tenant else {
                    return Ok(None);
                };
                tx.execute(
                    "INSERT INTO documents (id, knowledge_base_id, tenant_id, title, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
                    params![id, kb_id, tenant_id, title, now],
                )?;
                let doc = tx.query_row(
                    &format!("SELECT {DOC_COLUMNS} FROM documents WHERE id = ?1"),
                    params![id],
                    row_to_document,
                )?;
                tx.commit()?;
                Ok(Some(doc))
            })
            .await
            .map_err(map_tr_err)?;

        created.ok_or_else(|| {
            AtendenteError::Internal(format!("knowledge base {knowledge_base_id} not found"))
        })
    }

    pub async fn get_document(&self, id: &str) -> Result<Option<Document>, AtendenteError> {
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.query_row(
                    &format!("SELECT {DOC_COLUMNS} FROM documents WHERE id = ?1"),
                    params![id],
                    row_to_document,
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    /// All documents of a tenant, newest first.
    pub async fn list_documents(&self, tenant_id: &str) -> Result<Vec<Document>, AtendenteError> {
        let tenant_id = tenant_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DOC_COLUMNS} FROM documents WHERE tenant_id = ?1
                     ORDER BY created_at DESC, id"
                ))?;
                let rows = stmt.query_map(params![tenant_id], row_to_document)?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn delete_document(&self, id: &str) -> Result<bool, AtendenteError> {
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
    ) -> Result<(), AtendenteError> {
        let id = id.to_string();
        let status = status.to_string();
        let now = now_timestamp();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE documents SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status, now, id],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Stores every chunk and marks the document `ready`, atomically.
    pub async fn complete_document(
        &self,
        document_id: &str,
        chunks: Vec<NewChunk>,
    ) -> Result<(), AtendenteError> {
        let document_id = document_id.to_string();
        let now = now_timestamp();
        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let tenant_id: String = tx.query_row(
                    "SELECT tenant_id FROM documents WHERE id = ?1",
                    params![document_id],
                    |row| row.get(0),
                )?;
                {
                    let mut insert = tx.prepare(
                        "INSERT INTO chunks (id, document_id, tenant_id, chunk_index, content, token_count, embedding, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )?;
                    for chunk in &chunks {
                        insert.execute(params![
                            uuid::Uuid::new_v4().to_string(),
                            document_id,
                            tenant_id,
                            chunk.index as i64,
                            chunk.content,
                            chunk.token_count as i64,
                            vec_to_blob(&chunk.embedding),
                            now,
                        ])?;
                    }
                }
                tx.execute(
                    "UPDATE documents SET status = 'ready', error = NULL, chunk_count = ?1, updated_at = ?2
                     WHERE id = ?3",
                    params![chunks.len() as i64, now, document_id],
                )?;
                tx.commit()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Removes any chunks of the document and records the failure.
    pub async fn fail_document(&self, document_id: &str, message: &str) -> Result<(), AtendenteError> {
        let document_id = document_id.to_string();
        let message = message.to_string();
        let now = now_timestamp();
        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM chunks WHERE document_id = ?1",
                    params![document_id],
                )?;
                tx.execute(
                    "UPDATE documents SET status = 'error', error = ?1, chunk_count = 0, updated_at = ?2
                     WHERE id = ?3",
                    params![message, now, document_id],
                )?;
                tx.commit()
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn count_chunks(&self, document_id: &str) -> Result<usize, AtendenteError> {
        let document_id = document_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM chunks WHERE document_id = ?1",
                    params![document_id],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Every chunk of the tenant's `ready` documents.
    pub async fn tenant_chunks(&self, tenant_id: &str) -> Result<Vec<StoredChunk>, AtendenteError> {
        let tenant_id = tenant_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.document_id, c.content, c.embedding
                     FROM chunks c JOIN documents d ON d.id = c.document_id
                     WHERE c.tenant_id = ?1 AND d.status = 'ready'
                     ORDER BY c.document_id, c.chunk_index",
                )?;
                let rows = stmt.query_map(params![tenant_id], |row| {
                    let blob: Vec<u8> = row.get(3)?;
                    Ok(StoredChunk {
                        id: row.get(0)?,
                        document_id: row.get(1)?,
                        content: row.get(2)?,
                        embedding: blob_to_vec(&blob),
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> KnowledgeStore {
        KnowledgeStore::new(Database::open_in_memory().await.unwrap())
    }

    fn chunk(index: usize, content: &str, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            index,
            content: content.into(),
            token_count: 1,
            embedding,
        }
    }

    #[tokio::test]
    async fn ensure_knowledge_base_is_idempotent() {
        let store = store().await;
        let first = store.ensure_knowledge_base("t1", "default").await.unwrap();
        let second = store.ensure_knowledge_base("t1", "default").await.unwrap();
        assert_eq!(first, second);
        let other = store.ensure_knowledge_base("t2", "default").await.unwrap();
        assert_ne!(first.id, other.id);
        assert_eq!(store.list_knowledge_bases("t1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn document_starts_pending_and_inherits_tenant() {
        let store = store().await;
        let kb = store.ensure_knowledge_base("t1", "default").await.unwrap();
        let doc = store.create_document(&kb.id, "FAQ").await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.tenant_id, "t1");
        assert_eq!(doc.chunk_count, 0);
        assert!(store.create_document("missing", "x").await.is_err());
    }

    #[tokio::test]
    async fn only_ready_documents_are_searchable() {
        let store = store().await;
        let kb = store.ensure_knowledge_base("t1", "default").await.unwrap();
        let ready = store.create_document(&kb.id, "a").await.unwrap();
        let pending = store.create_document(&kb.id, "b").await.unwrap();

        store
            .complete_document(&ready.id, vec![chunk(0, "um", vec![1.0, 0.0]), chunk(1, "dois", vec![0.0, 1.0])])
            .await
            .unwrap();

        let chunks = store.tenant_chunks("t1").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.document_id == ready.id));
        assert_eq!(chunks[1].embedding, vec![0.0, 1.0]);
        assert!(store.tenant_chunks("t2").await.unwrap().is_empty());

        let doc = store.get_document(&ready.id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Ready);
        assert_eq!(doc.chunk_count, 2);
        assert_eq!(store.count_chunks(&pending.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failure_removes_chunks_and_records_message() {
        let store = store().await;
        let kb = store.ensure_knowledge_base("t1", "default").await.unwrap();
        let doc = store.create_document(&kb.id, "a").await.unwrap();
        store
            .complete_document(&doc.id, vec![chunk(0, "um", vec![1.0])])
            .await
            .unwrap();

        store.fail_document(&doc.id, "embedding failed").await.unwrap();

        let doc = store.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(doc.status, DocumentStatus::Error);
        assert_eq!(doc.error.as_deref(), Some("embedding failed"));
        assert_eq!(store.count_chunks(&doc.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deleting_knowledge_base_cascades() {
        let store = store().await;
        let kb = store.ensure_knowledge_base("t1", "default").await.unwrap();
        let doc = store.create_document(&kb.id, "a").await.unwrap();
        store
            .complete_document(&doc.id, vec![chunk(0, "um", vec![1.0])])
            .await
            .unwrap();

        assert!(store.delete_knowledge_base(&kb.id).await.unwrap());
        assert!(store.get_document(&doc.id).await.unwrap().is_none());
        assert!(store.tenant_chunks("t1").await.unwrap().is_empty());
        assert!(!store.delete_document(&doc.id).await.unwrap());
    }
}
