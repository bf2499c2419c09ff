// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gemini REST request/response types and conversions from core types.

use atendente_core::types::{
    FinishReason, GenerateRequest, ProviderResponse, ToolCall, ToolDefinition, Turn, TurnPart,
    TurnRole,
};
use serde::{Deserialize, Serialize};

// --- Request types ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One content part. Exactly one field is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded bytes.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolBlock {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedContentRequest {
    pub model: String,
    pub content: Content,
}

// --- Response types ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedContentResponse {
    pub embedding: Embedding,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub status: Option<String>,
    pub message: String,
}

// --- Conversions ---

fn role_name(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "user",
        TurnRole::Model => "model",
    }
}

fn to_part(part: &TurnPart) -> Part {
    match part {
        TurnPart::Text { text } => Part::text(text.clone()),
        TurnPart::ToolCall { call } => Part {
            function_call: Some(FunctionCall {
                name: call.name.clone(),
                args: call.args.clone(),
            }),
            ..Part::default()
        },
        TurnPart::ToolResult { name, response } => Part {
            function_response: Some(FunctionResponse {
                name: name.clone(),
                response: response.clone(),
            }),
            ..Part::default()
        },
    }
}

pub fn to_content(turn: &Turn) -> Content {
    Content {
        role: Some(role_name(turn.role).to_string()),
        parts: turn.parts.iter().map(to_part).collect(),
    }
}

fn to_tool_block(tools: &[ToolDefinition]) -> Vec<ToolBlock> {
    if tools.is_empty() {
        return Vec::new();
    }
    vec![ToolBlock {
        function_declarations: tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            })
            .collect(),
    }]
}

impl GenerateContentRequest {
    pub fn from_core(request: &GenerateRequest, temperature: f32) -> Self {
        let system_instruction = (!request.system_prompt.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part::text(request.system_prompt.clone())],
        });
        Self {
            system_instruction,
            contents: request.turns.iter().map(to_content).collect(),
            tools: to_tool_block(&request.tools),
            generation_config: Some(GenerationConfig { temperature }),
        }
    }
}

pub fn parse_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        None | Some("STOP") => FinishReason::Stop,
        Some("MAX_TOKENS") => FinishReason::MaxTokens,
        Some("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" | "SPII") => FinishReason::Safety,
        Some(other) => FinishReason::Other(other.to_string()),
    }
}

impl GenerateContentResponse {
    /// Flattens the first candidate into text, tool calls and a finish reason.
    ///
    /// A prompt blocked before any candidate was produced counts as a safety stop.
    pub fn into_core(self) -> ProviderResponse {
        let blocked = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_ref())
            .is_some();

        let Some(candidate) = self.candidates.into_iter().next() else {
            let finish_reason = if blocked {
                FinishReason::Safety
            } else {
                FinishReason::Other("NO_CANDIDATES".into())
            };
            return ProviderResponse {
                text: String::new(),
                tool_calls: Vec::new(),
                finish_reason,
            };
        };

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall {
                    name: call.name,
                    args: call.args,
                });
            }
        }

        ProviderResponse {
            text,
            tool_calls,
            finish_reason: parse_finish_reason(candidate.finish_reason.as_deref()),
        }
    }
}
