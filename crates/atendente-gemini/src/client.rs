// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Gemini `generateContent` and `embedContent` endpoints.
//!
//! One attempt per call. Retrying is the LLM client's job; this layer only
//! classifies failures by HTTP status so that decision can be made.

use std::time::Duration;

use atendente_core::AtendenteError;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::{
    ApiErrorResponse, Content, EmbedContentRequest, EmbedContentResponse, GenerateContentRequest,
    GenerateContentResponse, Part,
};

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, AtendenteError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key).map_err(|e| {
                AtendenteError::Config(format!("invalid API key header value: {e}"))
            })?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AtendenteError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AtendenteError> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        self.post(&url, request).await
    }

    pub async fn embed_content(&self, model: &str, text: &str) -> Result<Vec<f32>, AtendenteError> {
        let url = format!("{}/models/{model}:embedContent", self.base_url);
        let request = EmbedContentRequest {
            model: format!("models/{model}"),
            content: Content {
                role: None,
                parts: vec![Part::text(text)],
            },
        };
        let response: EmbedContentResponse = self.post(&url, &request).await?;
        Ok(response.embedding.values)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R, AtendenteError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| AtendenteError::Provider {
                message: format!("HTTP request failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, url, "gemini response received");

        let text = response.text().await.map_err(|e| AtendenteError::Provider {
            message: format!("failed to read response body: {e}"),
            status: None,
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_err) => match api_err.error.status {
                    Some(kind) => format!("{kind}: {}", api_err.error.message),
                    None => api_err.error.message,
                },
                Err(_) => text,
            };
            return Err(AtendenteError::provider_status(status.as_u16(), detail));
        }

        serde_json::from_str(&text).map_err(|e| AtendenteError::Provider {
            message: format!("failed to parse API response: {e}"),
            status: Some(status.as_u16()),
            source: Some(Box::new(e)),
        })
    }
}
