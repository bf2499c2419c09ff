// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge wire protocol.
//!
//! Every WebSocket text message is one JSON object tagged by `type`.
//!
//! Client -> bridge:
//! ```json
//! {"type": "hello", "session_id": "loja-1", "credentials": {"creds": {...}}}
//! {"type": "send_text", "request_id": "r1", "to": "5511999999999@s.whatsapp.net", "text": "Olá"}
//! {"type": "presence", "request_id": "r2", "to": "...", "presence": "composing"}
//! {"type": "download", "request_id": "r3", "message": {...}}
//! {"type": "logout", "request_id": "r4"}
//! ```
//!
//! Bridge -> client:
//! ```json
//! {"type": "qr", "code": "2@abc..."}
//! {"type": "connecting"}
//! {"type": "open"}
//! {"type": "close", "reason": "logged_out"}
//! {"type": "creds", "update": {"creds": {...}, "pre-key-1": null}}
//! {"type": "messages", "messages": [{...}]}
//! {"type": "ack", "request_id": "r1", "message_id": "3EB0..."}
//! {"type": "media", "request_id": "r3", "mime_type": "audio/ogg", "data": "<base64>"}
//! {"type": "error", "request_id": "r1", "message": "not connected"}
//! ```

use atendente_core::types::{CloseReason, CredentialSnapshot, Presence, TransportEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Hello {
        session_id: String,
        #[serde(default)]
        credentials: CredentialSnapshot,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    SendText {
        request_id: String,
        to: String,
        text: String,
    },
    Presence {
        request_id: String,
        to: String,
        presence: Presence,
    },
    Download {
        request_id: String,
        message: serde_json::Value,
    },
    Logout {
        request_id: String,
    },
}

/// Why the bridge closed the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseKind {
    LoggedOut,
    #[serde(other)]
    Lost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Qr {
        code: String,
    },
    Connecting,
    Open,
    Close {
        reason: CloseKind,
        #[serde(default)]
        message: Option<String>,
    },
    Creds {
        update: CredentialSnapshot,
    },
    Messages {
        messages: Vec<serde_json::Value>,
    },
    Ack {
        request_id: String,
        #[serde(default)]
        message_id: Option<String>,
    },
    Media {
        request_id: String,
        mime_type: String,
        data: String,
    },
    Error {
        #[serde(default)]
        request_id: Option<String>,
        message: String,
    },
}

/// Reply to a correlated request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack { message_id: Option<String> },
    Media { mime_type: String, data: String },
    Error(String),
}

/// A decoded server frame: either a connection event or a reply to a request.
#[derive(Debug)]
pub enum Incoming {
    Event(TransportEvent),
    Reply { request_id: String, reply: Reply },
    /// An error not tied to any request.
    Notice(String),
}

impl From<ServerFrame> for Incoming {
    fn from(frame: ServerFrame) -> Self {
        match frame {
            ServerFrame::Qr { code } => Incoming::Event(TransportEvent::PairingCode(code)),
            ServerFrame::Connecting => Incoming::Event(TransportEvent::Connecting),
            ServerFrame::Open => Incoming::Event(TransportEvent::Open),
            ServerFrame::Close { reason, message } => {
                let reason = match reason {
                    CloseKind::LoggedOut => CloseReason::LoggedOut,
                    CloseKind::Lost => CloseReason::ConnectionLost(
                        message.unwrap_or_else(|| "closed by bridge".into()),
                    ),
                };
                Incoming::Event(TransportEvent::Closed(reason))
            }
            ServerFrame::Creds { update } => {
                Incoming::Event(TransportEvent::CredentialsUpdated(update))
            }
            ServerFrame::Messages { messages } => {
                Incoming::Event(TransportEvent::Messages(messages))
            }
            ServerFrame::Ack {
                request_id,
                message_id,
            } => Incoming::Reply {
                request_id,
                reply: Reply::Ack { message_id },
            },
            ServerFrame::Media {
                request_id,
                mime_type,
                data,
            } => Incoming::Reply {
                request_id,
                reply: Reply::Media { mime_type, data },
            },
            ServerFrame::Error {
                request_id: Some(request_id),
                message,
            } => Incoming::Reply {
                request_id,
                reply: Reply::Error(message),
            },
            ServerFrame::Error {
                request_id: None,
                message,
            } => Incoming::Notice(message),
        }
    }
}
