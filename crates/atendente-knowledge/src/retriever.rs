// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Similarity search over a tenant's ready chunks.

use std::cmp::Ordering;
use std::sync::Arc;

use atendente_core::AtendenteError;
use atendente_core::traits::EmbeddingAdapter;
use tracing::debug;

use crate::store::KnowledgeStore;
use crate::types::{ScoredChunk, StoredChunk, cosine_similarity};

/// Scores every chunk against `query` and keeps the best `k`, highest first.
///
/// Chunks whose embedding length differs from the query score zero.
pub fn rank(query: &[f32], chunks: Vec<StoredChunk>, k: usize) -> Vec<ScoredChunk> {
    let mut scored: Vec<ScoredChunk> = chunks
        .into_iter()
        .map(|chunk| ScoredChunk {
            score: cosine_similarity(query, &chunk.embedding),
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            content: chunk.content,
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

/// Joins retrieved chunks into a prompt section.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n---\n")
}

#[derive(Clone)]
pub struct Retriever {
    store: KnowledgeStore,
    embedder: Arc<dyn EmbeddingAdapter>,
    top_k: usize,
}

impl Retriever {
    pub fn new(store: KnowledgeStore, embedder: Arc<dyn EmbeddingAdapter>, top_k: usize) -> Self {
        Self {
            store,
            embedder,
            top_k,
        }
    }

    pub async fn search(
        &self,
        tenant_id: &str,
        query: &str,
    ) -> Result<Vec<ScoredChunk>, AtendenteError> {
        self.search_top(tenant_id, query, self.top_k).await
    }

    /// Embeds `query` once and ranks the tenant's chunks. Blank queries match nothing.
    pub async fn search_top(
        &self,
        tenant_id: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, AtendenteError> {
        if query.trim().is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let chunks = self.store.tenant_chunks(tenant_id).await?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;
        let total = chunks.len();
        let results = rank(&query_vec, chunks, k);
        debug!(tenant_id, candidates = total, returned = results.len(), "knowledge search");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn stored(id: &str, embedding: Vec<f32>) -> StoredChunk {
        StoredChunk {
            id: id.into(),
            document_id: "d".into(),
            content: format!("content {id}"),
            embedding,
        }
    }

    #[test]
    fn rank_orders_by_similarity() {
        let chunks = vec![
            stored("far", vec![0.0, 1.0]),
            stored("near", vec![1.0, 0.1]),
            stored("mid", vec![1.0, 1.0]),
        ];
        let ranked = rank(&[1.0, 0.0], chunks, 2);
        let ids: Vec<&str> = ranked.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        let ranked = rank(&[1.0, 0.0], vec![stored("odd", vec![1.0, 0.0, 0.0])], 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 0.0);
    }

    #[test]
    fn format_context_separates_chunks() {
        let ranked = rank(&[1.0], vec![stored("a", vec![1.0]), stored("b", vec![0.5])], 2);
        assert_eq!(format_context(&ranked), "content a\n---\ncontent b");
        assert_eq!(format_context(&[]), "");
    }

    proptest! {
        #[test]
        fn rank_is_bounded_and_non_increasing(
            query in proptest::collection::vec(-1.0f32..1.0, 4),
            embeddings in proptest::collection::vec(proptest::collection::vec(-1.0f32..1.0, 4), 0..30),
            k in 0usize..10,
        ) {
            let chunks: Vec<StoredChunk> = embeddings
                .into_iter()
                .enumerate()
                .map(|(i, e)| stored(&i.to_string(), e))
                .collect();
            let total = chunks.len();
            let ranked = rank(&query, chunks, k);
            prop_assert_eq!(ranked.len(), k.min(total));
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for chunk in &ranked {
                prop_assert!(chunk.score >= -1.0 - 1e-5 && chunk.score <= 1.0 + 1e-5);
            }
        }
    }
}
