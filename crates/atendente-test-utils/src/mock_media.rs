// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock media understanding adapter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use atendente_core::AtendenteError;
use atendente_core::traits::{MediaAdapter, PluginAdapter};
use atendente_core::types::{AdapterType, HealthStatus, MediaBlob};

/// Returns fixed texts for every transcription and description.
pub struct MockMedia {
    transcription: String,
    description: String,
    fail: AtomicBool,
    seen: Mutex<Vec<MediaBlob>>,
}

impl MockMedia {
    pub fn new(transcription: &str, description: &str) -> Self {
        Self {
            transcription: transcription.to_string(),
            description: description.to_string(),
            fail: AtomicBool::new(false),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Blobs passed to either operation, in order.
    pub fn seen(&self) -> Vec<MediaBlob> {
        self.seen.lock().unwrap().clone()
    }

    fn record(&self, media: &MediaBlob) -> Result<(), AtendenteError> {
        self.seen.lock().unwrap().push(media.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(AtendenteError::provider_status(500, "mock media failure"));
        }
        Ok(())
    }
}

impl Default for MockMedia {
    fn default() -> Self {
        Self::new("transcribed audio", "an image")
    }
}

#[async_trait]
impl PluginAdapter for MockMedia {
    fn name(&self) -> &str {
        "mock-media"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Media
    }

    async fn health_check(&self) -> Result<HealthStatus, AtendenteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AtendenteError> {
        Ok(())
    }
}

#[async_trait]
impl MediaAdapter for MockMedia {
    async fn transcribe(&self, media: &MediaBlob) -> Result<String, AtendenteError> {
        self.record(media)?;
        Ok(self.transcription.clone())
    }

    async fn describe(&self, media: &MediaBlob) -> Result<String, AtendenteError> {
        self.record(media)?;
        Ok(self.description.clone())
    }
}
