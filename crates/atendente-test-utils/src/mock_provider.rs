// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock generative and embedding providers.
//!
//! `MockProvider` pops scripted replies from a FIFO queue. When the queue is
//! empty, a default "mock response" text is returned.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use atendente_core::AtendenteError;
use atendente_core::traits::{EmbeddingAdapter, PluginAdapter, ProviderAdapter};
use atendente_core::types::{AdapterType, GenerateRequest, HealthStatus, ProviderResponse};

/// One scripted provider outcome.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(ProviderResponse),
    /// Fails with the given HTTP status.
    Status(u16),
    /// Fails without a status, like a dropped connection.
    Unreachable,
}

impl MockReply {
    pub fn text(text: &str) -> Self {
        MockReply::Respond(ProviderResponse::text(text))
    }
}

pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            ..Self::new()
        }
    }

    pub async fn push(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub async fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, AtendenteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AtendenteError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<ProviderResponse, AtendenteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request);
        let reply = self.replies.lock().await.pop_front();
        match reply {
            None => Ok(ProviderResponse::text("mock response")),
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Status(code)) => {
                Err(AtendenteError::provider_status(code, "mock failure"))
            }
            Some(MockReply::Unreachable) => Err(AtendenteError::Provider {
                message: "mock connection refused".into(),
                status: None,
                source: None,
            }),
        }
    }
}

/// Dimension of [`MockEmbedder`] vectors.
pub const MOCK_EMBEDDING_DIM: usize = 64;

/// Hashes lowercase words into a fixed number of buckets.
///
/// Texts that share words get a positive cosine similarity, so retrieval
/// ranking can be tested without a real model.
pub struct MockEmbedder {
    fail: AtomicBool,
    fail_from_call: AtomicUsize,
    calls: AtomicUsize,
    pinned: std::sync::Mutex<HashMap<String, Vec<f32>>>,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
            fail_from_call: AtomicUsize::new(usize::MAX),
            calls: AtomicUsize::new(0),
            pinned: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Succeeds for the first `n - 1` calls, then fails.
    pub fn fail_from_call(&self, n: usize) {
        self.fail_from_call.store(n, Ordering::SeqCst);
    }

    /// Returns `vector` for exactly `text` instead of the hashed vector.
    pub fn pin(&self, text: &str, vector: Vec<f32>) {
        self.pinned.lock().unwrap().insert(text.to_string(), vector);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; MOCK_EMBEDDING_DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) as usize % MOCK_EMBEDDING_DIM;
            vector[bucket] += 1.0;
        }
        vector
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, AtendenteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AtendenteError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AtendenteError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail.load(Ordering::SeqCst) || call >= self.fail_from_call.load(Ordering::SeqCst) {
            return Err(AtendenteError::provider_status(500, "mock embedding failure"));
        }
        if let Some(vector) = self.pinned.lock().unwrap().get(text) {
            return Ok(vector.clone());
        }
        Ok(Self::vector_for(text))
    }
}
