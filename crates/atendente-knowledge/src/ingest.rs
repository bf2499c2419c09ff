// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document ingestion: chunk, embed, store.
//!
//! [`Ingestor::submit`] registers the document and returns immediately; the
//! chunking and embedding run on a detached task. Any failure rolls the
//! document back to zero chunks with status `error`.

use std::sync::Arc;

use atendente_config::model::KnowledgeConfig;
use atendente_core::AtendenteError;
use atendente_core::traits::EmbeddingAdapter;
use tracing::{error, info};

use crate::chunker::chunk_text;
use crate::store::KnowledgeStore;
use crate::types::{Document, DocumentStatus, NewChunk};

#[derive(Clone)]
pub struct Ingestor {
    store: KnowledgeStore,
    embedder: Arc<dyn EmbeddingAdapter>,
    chunk_size: usize,
    overlap: usize,
}

impl Ingestor {
    pub fn new(
        store: KnowledgeStore,
        embedder: Arc<dyn EmbeddingAdapter>,
        config: &KnowledgeConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        }
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// Registers a document and processes it in the background.
    ///
    /// The returned document is still `pending`; poll
    /// [`KnowledgeStore::get_document`] for the outcome.
    pub async fn submit(
        &self,
        knowledge_base_id: &str,
        title: &str,
        text: String,
    ) -> Result<Document, AtendenteError> {
        let document = self.store.create_document(knowledge_base_id, title).await?;
        let ingestor = self.clone();
        let document_id = document.id.clone();
        tokio::spawn(async move {
            // Failures are already recorded on the document row.
            let _ = ingestor.ingest(&document_id, &text).await;
        });
        Ok(document)
    }

    /// Processes a registered document to completion and returns its chunk count.
    pub async fn ingest(&self, document_id: &str, text: &str) -> Result<usize, AtendenteError> {
        self.store
            .set_status(document_id, DocumentStatus::Processing)
            .await?;

        match self.embed_chunks(document_id, text).await {
            Ok(chunks) => {
                let count = chunks.len();
                self.store.complete_document(document_id, chunks).await?;
                metrics::counter!("atendente_documents_ingested_total").increment(1);
                info!(document_id, chunks = count, "document ingested");
                Ok(count)
            }
            Err(e) => {
                let message = e.to_string();
                error!(document_id, error = %message, "document ingestion failed");
                metrics::counter!("atendente_ingestion_failures_total").increment(1);
                self.store.fail_document(document_id, &message).await?;
                Err(AtendenteError::Ingestion {
                    document_id: document_id.to_string(),
                    message,
                })
            }
        }
    }

    async fn embed_chunks(
        &self,
        document_id: &str,
        text: &str,
    ) -> Result<Vec<NewChunk>, AtendenteError> {
        let pieces = chunk_text(text, self.chunk_size, self.overlap);
        if pieces.is_empty() {
            return Err(AtendenteError::Ingestion {
                document_id: document_id.to_string(),
                message: "document has no text".into(),
            });
        }

        let mut chunks = Vec::with_capacity(pieces.len());
        for piece in pieces {
            let embedding = self.embedder.embed(&piece.content).await?;
            if let Some(first) = chunks.first().map(|c: &NewChunk| c.embedding.len())
                && first != embedding.len()
            {
                return Err(AtendenteError::Ingestion {
                    document_id: document_id.to_string(),
                    message: format!(
                        "embedding length changed from {first} to {}",
                        embedding.len()
                    ),
                });
            }
            chunks.push(NewChunk {
                index: piece.index,
                content: piece.content,
                token_count: piece.token_count,
                embedding,
            });
        }
        Ok(chunks)
    }
}
