// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Google Gemini adapters for Atendente.
//!
//! One HTTP client backs three collaborators:
//! [`GeminiProvider`] (text generation with function calling),
//! [`GeminiEmbedder`] (document and query embeddings) and
//! [`GeminiMedia`] (voice-note transcription and image description).

pub mod client;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atendente_config::model::GeminiConfig;
use atendente_core::AtendenteError;
use atendente_core::traits::{EmbeddingAdapter, MediaAdapter, PluginAdapter, ProviderAdapter};
use atendente_core::types::{
    AdapterType, GenerateRequest, HealthStatus, MediaBlob, ProviderResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use crate::client::GeminiClient;
use crate::types::{Content, GenerateContentRequest, InlineData, Part};

const TRANSCRIBE_PROMPT: &str =
    "Transcreva este áudio em português exatamente como foi falado. Responda apenas com a transcrição.";
const DESCRIBE_PROMPT: &str =
    "Descreva objetivamente o conteúdo desta imagem em português, em até três frases.";

/// Returns the configured key, falling back to `GEMINI_API_KEY`.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, AtendenteError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("GEMINI_API_KEY").map_err(|_| {
        AtendenteError::Config(
            "Gemini API key not found. Set gemini.api_key in config or GEMINI_API_KEY environment variable.".into(),
        )
    })
}

/// Builds the shared HTTP client from configuration.
pub fn client_from_config(config: &GeminiConfig) -> Result<Arc<GeminiClient>, AtendenteError> {
    let api_key = resolve_api_key(&config.api_key)?;
    let client = GeminiClient::new(
        &api_key,
        &config.api_base,
        Duration::from_secs(config.timeout_secs),
    )?;
    info!(
        model = config.model,
        embedding_model = config.embedding_model,
        "Gemini client initialized"
    );
    Ok(Arc::new(client))
}

macro_rules! plugin_adapter {
    ($ty:ty, $name:literal, $kind:expr) => {
        #[async_trait]
        impl PluginAdapter for $ty {
            fn name(&self) -> &str {
                $name
            }

            fn version(&self) -> semver::Version {
                semver::Version::new(0, 1, 0)
            }

            fn adapter_type(&self) -> AdapterType {
                $kind
            }

            async fn health_check(&self) -> Result<HealthStatus, AtendenteError> {
                Ok(HealthStatus::Healthy)
            }

            async fn shutdown(&self) -> Result<(), AtendenteError> {
                debug!(adapter = $name, "shutting down");
                Ok(())
            }
        }
    };
}

/// Text generation with function calling.
pub struct GeminiProvider {
    client: Arc<GeminiClient>,
    model: String,
    temperature: f32,
}

impl GeminiProvider {
    pub fn new(client: Arc<GeminiClient>, config: &GeminiConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

plugin_adapter!(GeminiProvider, "gemini", AdapterType::Provider);

#[async_trait]
impl ProviderAdapter for GeminiProvider {
    async fn generate(&self, request: GenerateRequest) -> Result<ProviderResponse, AtendenteError> {
        let body = GenerateContentRequest::from_core(&request, self.temperature);
        let response = self.client.generate_content(&self.model, &body).await?;
        Ok(response.into_core())
    }
}

pub struct GeminiEmbedder {
    client: Arc<GeminiClient>,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(client: Arc<GeminiClient>, config: &GeminiConfig) -> Self {
        Self {
            client,
            model: config.embedding_model.clone(),
        }
    }
}

plugin_adapter!(GeminiEmbedder, "gemini-embedding", AdapterType::Embedding);

#[async_trait]
impl EmbeddingAdapter for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AtendenteError> {
        let values = self.client.embed_content(&self.model, text).await?;
        if values.is_empty() {
            return Err(AtendenteError::Provider {
                message: "embedding response contained no values".into(),
                status: None,
                source: None,
            });
        }
        Ok(values)
    }
}

/// Audio transcription and image description through multimodal generation.
pub struct GeminiMedia {
    client: Arc<GeminiClient>,
    model: String,
}

impl GeminiMedia {
    pub fn new(client: Arc<GeminiClient>, config: &GeminiConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
        }
    }

    async fn ask(&self, media: &MediaBlob, prompt: &str) -> Result<String, AtendenteError> {
        let body = GenerateContentRequest {
            system_instruction: None,
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![
                    Part {
                        inline_data: Some(InlineData {
                            mime_type: media.mime_type.clone(),
                            data: STANDARD.encode(&media.data),
                        }),
                        ..Part::default()
                    },
                    Part::text(prompt),
                ],
            }],
            tools: Vec::new(),
            generation_config: None,
        };
        let response = self.client.generate_content(&self.model, &body).await?;
        Ok(response.into_core().text.trim().to_string())
    }
}

plugin_adapter!(GeminiMedia, "gemini-media", AdapterType::Media);

#[async_trait]
impl MediaAdapter for GeminiMedia {
    async fn transcribe(&self, media: &MediaBlob) -> Result<String, AtendenteError> {
        self.ask(media, TRANSCRIBE_PROMPT).await
    }

    async fn describe(&self, media: &MediaBlob) -> Result<String, AtendenteError> {
        self.ask(media, DESCRIBE_PROMPT).await
    }
}
