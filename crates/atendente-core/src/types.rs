// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the adapter traits and the automation pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of one transport session (one tenant messaging identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

/// Identifier of a conversation with one counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a [`crate::PluginAdapter`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Transport,
    Provider,
    Embedding,
    Media,
}

// --- Sessions ---

/// Connection state of a transport session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Connecting,
    WaitingQr,
    Connected,
    Disconnected,
}

/// Why a transport socket closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The account was logged out remotely. Credentials are no longer valid.
    LoggedOut,
    /// Any other close (network drop, server restart, stream error).
    ConnectionLost(String),
}

/// Persisted transport authentication material, keyed by credential name.
pub type CredentialSnapshot = BTreeMap<String, serde_json::Value>;

/// Events produced by a live transport connection.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A new pairing code (QR payload) must be scanned.
    PairingCode(String),
    /// The socket is (re)negotiating.
    Connecting,
    /// The socket is authenticated and open.
    Open,
    /// The socket closed.
    Closed(CloseReason),
    /// Authentication material changed. A `null` value removes the key.
    CredentialsUpdated(CredentialSnapshot),
    /// Raw message payloads as delivered by the transport.
    Messages(Vec<serde_json::Value>),
}

/// Typing indicator shown to the counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Composing,
    Paused,
}

/// Result of a successful transport send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentReceipt {
    /// Transport-level id of the sent message, when the transport reports one.
    pub message_id: Option<String>,
}

/// Downloaded media content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub mime_type: String,
    pub data: Vec<u8>,
}

// --- Conversations and messages ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Who authored a domain message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Originator {
    Customer,
    Automation,
    HumanAgent,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Audio,
    Image,
    File,
}

/// The ongoing exchange with one counterpart within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub tenant_id: String,
    /// Transport identity of the counterpart (for example a phone JID).
    pub counterpart: String,
    pub display_name: Option<String>,
    pub paused: bool,
    pub welcome_sent: bool,
    pub last_activity_at: String,
    pub created_at: String,
}

/// A persisted message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainMessage {
    pub id: String,
    pub conversation_id: ConversationId,
    pub direction: Direction,
    pub originator: Originator,
    pub kind: ContentKind,
    pub text: String,
    /// Raw transport payload kept for audit, when there was one.
    pub raw: Option<serde_json::Value>,
    pub transport_message_id: Option<String>,
    pub created_at: String,
}

impl DomainMessage {
    /// Creates a new message with a fresh id and the current timestamp.
    pub fn new(
        conversation_id: ConversationId,
        direction: Direction,
        originator: Originator,
        kind: ContentKind,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id,
            direction,
            originator,
            kind,
            text: text.into(),
            raw: None,
            transport_message_id: None,
            created_at: now_timestamp(),
        }
    }
}

/// RFC 3339 timestamp with millisecond precision, sortable as text.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// --- Generative provider ---

/// Role of a conversation turn sent to the generative provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Model,
}

/// One part of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TurnPart {
    Text { text: String },
    ToolCall { call: ToolCall },
    ToolResult {
        name: String,
        response: serde_json::Value,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<TurnPart>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            parts: vec![TurnPart::Text { text: text.into() }],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            parts: vec![TurnPart::Text { text: text.into() }],
        }
    }
}

/// A structured function invocation requested by the model.
///
/// Produced and consumed within a single engine invocation; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    /// Returns a string argument, if present.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }
}

/// A function the model may call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema object describing the arguments.
    pub parameters: serde_json::Value,
}

/// A single request to the generative provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub system_prompt: String,
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    /// The provider's safety filter blocked the output.
    Safety,
    Other(String),
}

/// A parsed generative provider response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
}

impl ProviderResponse {
    /// A plain text response with a normal stop reason.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
        }
    }
}

// --- Scheduling ---

/// Reference to a calendar owned by the scheduling collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRef(pub String);

/// An event to be created on a calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub summary: String,
    pub description: Option<String>,
    pub start: chrono::DateTime<chrono::Utc>,
    pub end: chrono::DateTime<chrono::Utc>,
    pub attendee: Option<String>,
}

/// Reference to a created event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    pub id: String,
    pub link: Option<String>,
}
