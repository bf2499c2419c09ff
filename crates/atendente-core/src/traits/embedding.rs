// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::AtendenteError;
use crate::traits::adapter::PluginAdapter;

/// Converts text into a fixed-length vector.
///
/// The vector length is constant for a given embedding model. A failure
/// aborts the calling operation.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AtendenteError>;
}
