// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event variants carried by the bus.

use atendente_core::types::{ContentKind, SessionId, SessionStatus};
use serde::Serialize;

/// A transport message after noise filtering and content classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedMessage {
    pub session_id: SessionId,
    /// Transport-level id of the message, if the payload carried one.
    pub transport_message_id: Option<String>,
    /// Counterpart identity (the chat the message belongs to).
    pub counterpart: String,
    /// Display name the counterpart chose, when known.
    pub push_name: Option<String>,
    /// True when the message was sent from the tenant's own account.
    pub from_me: bool,
    pub kind: ContentKind,
    pub text: String,
    /// Original payload, retained for audit and media download.
    pub raw: serde_json::Value,
}

/// Everything published on the bus.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A session needs its pairing code scanned.
    PairingCodeAvailable { session_id: SessionId, code: String },

    ConnectionStateChanged {
        session_id: SessionId,
        status: SessionStatus,
    },

    /// Raw payload from the transport, before routing.
    MessageReceived {
        session_id: SessionId,
        payload: serde_json::Value,
    },

    /// A counterpart-originated message ready for the automation pipeline.
    InboundMessage(RoutedMessage),

    /// A message sent by a human operator from the tenant's own account.
    ManualOutboundDetected(RoutedMessage),
}

impl BusEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            BusEvent::PairingCodeAvailable { session_id, .. }
            | BusEvent::ConnectionStateChanged { session_id, .. }
            | BusEvent::MessageReceived { session_id, .. } => session_id,
            BusEvent::InboundMessage(msg) | BusEvent::ManualOutboundDetected(msg) => {
                &msg.session_id
            }
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BusEvent::PairingCodeAvailable { .. } => "pairing_code_available",
            BusEvent::ConnectionStateChanged { .. } => "connection_state_changed",
            BusEvent::MessageReceived { .. } => "message_received",
            BusEvent::InboundMessage(_) => "inbound_message",
            BusEvent::ManualOutboundDetected(_) => "manual_outbound_detected",
        }
    }
}
