// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media-understanding adapter trait.

use async_trait::async_trait;

use crate::error::AtendenteError;
use crate::traits::adapter::PluginAdapter;
use crate::types::MediaBlob;

/// Turns non-text media into text the conversation pipeline can reason about.
#[async_trait]
pub trait MediaAdapter: PluginAdapter {
    /// Transcribes a voice note or audio file.
    async fn transcribe(&self, media: &MediaBlob) -> Result<String, AtendenteError>;

    /// Describes the content of an image.
    async fn describe(&self, media: &MediaBlob) -> Result<String, AtendenteError>;
}
