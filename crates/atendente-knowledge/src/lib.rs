// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant knowledge bases for Atendente.
//!
//! Documents are split into overlapping chunks, embedded, and stored as
//! little-endian f32 blobs. Retrieval embeds the query and ranks every ready
//! chunk of the tenant by cosine similarity.

pub mod chunker;
pub mod ingest;
pub mod retriever;
pub mod store;
pub mod types;

pub use chunker::{TextChunk, chunk_text, estimate_tokens};
pub use ingest::Ingestor;
pub use retriever::{Retriever, format_context, rank};
pub use store::KnowledgeStore;
pub use types::{Document, DocumentStatus, KnowledgeBase, ScoredChunk};

/// Name of the knowledge base documents land in when none is given.
pub const DEFAULT_KNOWLEDGE_BASE: &str = "default";
