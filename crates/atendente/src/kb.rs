// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `atendente kb` command implementations.

use std::path::Path;
use std::sync::Arc;

use atendente_config::model::AtendenteConfig;
use atendente_core::AtendenteError;
use atendente_gemini::GeminiEmbedder;
use atendente_knowledge::{DEFAULT_KNOWLEDGE_BASE, Document, Ingestor, KnowledgeStore};
use atendente_storage::Database;

async fn open_store(config: &AtendenteConfig) -> Result<KnowledgeStore, AtendenteError> {
    let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;
    Ok(KnowledgeStore::new(db))
}

/// Ingests `file` into the tenant's default knowledge base and waits for
/// the outcome.
pub async fn run_add(
    config: &AtendenteConfig,
    tenant: &str,
    file: &Path,
    title: Option<&str>,
) -> Result<(), AtendenteError> {
    let text = std::fs::read_to_string(file).map_err(|e| {
        AtendenteError::Internal(format!("failed to read {}: {e}", file.display()))
    })?;
    let title = match title {
        Some(title) => title.to_string(),
        None => file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "documento".to_string()),
    };

    let client = atendente_gemini::client_from_config(&config.gemini)?;
    let embedder = Arc::new(GeminiEmbedder::new(client, &config.gemini));
    let store = open_store(config).await?;
    let ingestor = Ingestor::new(store.clone(), embedder, &config.knowledge);

    let kb = store
        .ensure_knowledge_base(tenant, DEFAULT_KNOWLEDGE_BASE)
        .await?;
    let document = store.create_document(&kb.id, &title).await?;
    let chunks = ingestor.ingest(&document.id, &text).await?;
    println!("{}  {title}  ({chunks} chunks)", document.id);
    Ok(())
}

pub async fn run_list(config: &AtendenteConfig, tenant: &str) -> Result<(), AtendenteError> {
    let store = open_store(config).await?;
    let documents = store.list_documents(tenant).await?;
    if documents.is_empty() {
        println!("no documents for tenant {tenant}");
        return Ok(());
    }
    for document in &documents {
        println!("{}", format_document(document));
    }
    Ok(())
}

pub async fn run_remove(config: &AtendenteConfig, document_id: &str) -> Result<(), AtendenteError> {
    let store = open_store(config).await?;
    if store.delete_document(document_id).await? {
        println!("removed {document_id}");
        Ok(())
    } else {
        Err(AtendenteError::Internal(format!(
            "document {document_id} not found"
        )))
    }
}

fn format_document(document: &Document) -> String {
    let mut line = format!(
        "{}  {:<10}  {:>4} chunks  {}",
        document.id,
        document.status.to_string(),
        document.chunk_count,
        document.title
    );
    if let Some(error) = &document.error {
        line.push_str(&format!("  ({error})"));
    }
    line
}

#[cfg(test)]
mod tests {
    use atendente_knowledge::DocumentStatus;

    use super::*;

    fn document(status: DocumentStatus, error: Option<&str>) -> Document {
        Document {
            id: "d1".into(),
            knowledge_base_id: "kb1".into(),
            tenant_id: "padaria-sol".into(),
            title: "Cardápio".into(),
            status,
            error: error.map(str::to_string),
            chunk_count: 3,
            created_at: "2026-03-02T12:00:00Z".into(),
            updated_at: "2026-03-02T12:00:00Z".into(),
        }
    }

    #[test]
    fn ready_document_line() {
        let line = format_document(&document(DocumentStatus::Ready, None));
        assert!(line.starts_with("d1  ready"));
        assert!(line.contains("3 chunks"));
        assert!(line.ends_with("Cardápio"));
    }

    #[test]
    fn failed_document_shows_reason() {
        let line = format_document(&document(DocumentStatus::Error, Some("embedding failed")));
        assert!(line.contains("error"));
        assert!(line.ends_with("(embedding failed)"));
    }

    #[tokio::test]
    async fn list_and_remove_against_a_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AtendenteConfig::default();
        config.storage.database_path = dir.path().join("kb.db").display().to_string();

        let store = open_store(&config).await.unwrap();
        let kb = store
            .ensure_knowledge_base("padaria-sol", DEFAULT_KNOWLEDGE_BASE)
            .await
            .unwrap();
        let doc = store.create_document(&kb.id, "Horários").await.unwrap();

        run_list(&config, "padaria-sol").await.unwrap();
        run_remove(&config, &doc.id).await.unwrap();
        assert!(run_remove(&config, &doc.id).await.is_err());
        assert!(store.get_document(&doc.id).await.unwrap().is_none());
    }
}
