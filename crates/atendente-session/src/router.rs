// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Converts raw transport payloads into routed domain messages.
//!
//! Noise (status broadcasts, groups, control frames, empty envelopes) is
//! dropped silently. Everything else is classified by content shape and
//! republished either as an inbound customer message or, when the tenant's
//! own account sent it, as a manual operator send.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atendente_bus::{BusEvent, EventBus, EventSubscriber, RoutedMessage};
use atendente_core::types::{ContentKind, SessionId};
use serde_json::Value;
use tracing::{debug, warn};

use crate::ledger::SentLedger;

/// Longest wait for an in-flight send before an unknown own-message is
/// treated as an operator send.
const ECHO_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Message keys that mark control frames rather than content.
const CONTROL_FRAMES: &[&str] = &[
    "protocolMessage",
    "reactionMessage",
    "senderKeyDistributionMessage",
];

/// Wrappers whose inner `message` carries the real content.
const WRAPPERS: &[&str] = &[
    "ephemeralMessage",
    "viewOnceMessage",
    "viewOnceMessageV2",
    "documentWithCaptionMessage",
];

/// Why a payload produced no domain message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingChat,
    Broadcast,
    Group,
    ControlFrame,
    NoContent,
    /// Our own automated send coming back from the transport.
    OwnEcho,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Inbound(RoutedMessage),
    ManualOutbound(RoutedMessage),
    Drop(DropReason),
}

/// Decides what a raw payload becomes.
pub fn route(session_id: &SessionId, payload: &Value, sent: &SentLedger) -> Route {
    let key = payload.get("key");
    let Some(chat) = key
        .and_then(|k| k.get("remoteJid"))
        .and_then(Value::as_str)
        .filter(|jid| !jid.is_empty())
    else {
        return Route::Drop(DropReason::MissingChat);
    };

    if chat.ends_with("@broadcast") || chat.ends_with("@newsletter") {
        return Route::Drop(DropReason::Broadcast);
    }
    if chat.ends_with("@g.us") {
        return Route::Drop(DropReason::Group);
    }

    let Some(content) = payload.get("message").and_then(unwrap_content) else {
        return Route::Drop(DropReason::NoContent);
    };
    if CONTROL_FRAMES.iter().any(|frame| content.get(*frame).is_some()) {
        return Route::Drop(DropReason::ControlFrame);
    }

    let transport_message_id = key
        .and_then(|k| k.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let from_me = key
        .and_then(|k| k.get("fromMe"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if from_me
        && let Some(id) = &transport_message_id
        && sent.contains(id)
    {
        return Route::Drop(DropReason::OwnEcho);
    }

    let (kind, text) = classify(content);
    let message = RoutedMessage {
        session_id: session_id.clone(),
        transport_message_id,
        counterpart: chat.to_string(),
        push_name: payload
            .get("pushName")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        from_me,
        kind,
        text,
        raw: payload.clone(),
    };

    if from_me {
        Route::ManualOutbound(message)
    } else {
        Route::Inbound(message)
    }
}

/// Peels wrapper envelopes. Returns `None` for a missing or empty content object.
fn unwrap_content(message: &Value) -> Option<&Value> {
    let mut current = message;
    loop {
        if current.as_object().is_none_or(|obj| obj.is_empty()) {
            return None;
        }
        match WRAPPERS.iter().find_map(|w| current.get(*w)) {
            Some(wrapper) => current = wrapper.get("message")?,
            None => return Some(current),
        }
    }
}

/// Content kind and text by shape, in fixed precedence order.
pub fn classify(content: &Value) -> (ContentKind, String) {
    let text_at = |path: &[&str]| -> Option<String> {
        let mut node = content;
        for segment in path {
            node = node.get(*segment)?;
        }
        node.as_str().map(str::to_string)
    };

    if let Some(text) = text_at(&["conversation"]) {
        return (ContentKind::Text, text);
    }
    if let Some(text) = text_at(&["extendedTextMessage", "text"]) {
        return (ContentKind::Text, text);
    }
    if content.get("imageMessage").is_some() {
        let caption = text_at(&["imageMessage", "caption"]).unwrap_or_default();
        return (ContentKind::Image, caption);
    }
    if content.get("audioMessage").is_some() {
        return (ContentKind::Audio, String::new());
    }
    if content.get("documentMessage").is_some() {
        let name = text_at(&["documentMessage", "fileName"])
            .or_else(|| text_at(&["documentMessage", "caption"]))
            .unwrap_or_default();
        return (ContentKind::File, name);
    }
    (ContentKind::Text, String::new())
}

/// Bus subscriber that turns `MessageReceived` into routed events.
pub struct MessageRouter {
    sent: Arc<SentLedger>,
}

impl MessageRouter {
    pub fn new(sent: Arc<SentLedger>) -> Self {
        Self { sent }
    }

    /// An own-message with an unknown id may be the echo of a send to the
    /// same chat that has not returned yet. Waits for such sends, then
    /// checks the ledger again.
    async fn is_late_echo(&self, message: &RoutedMessage) -> bool {
        let Some(id) = &message.transport_message_id else {
            return false;
        };
        let session = message.session_id.as_str();
        if !self.sent.has_pending(session, &message.counterpart) {
            return false;
        }
        if !self
            .sent
            .wait_settled(session, &message.counterpart, ECHO_SETTLE_TIMEOUT)
            .await
        {
            warn!(
                session_id = %message.session_id,
                counterpart = %message.counterpart,
                "send still in flight, own message treated as manual"
            );
        }
        self.sent.contains(id)
    }
}

#[async_trait]
impl EventSubscriber for MessageRouter {
    fn name(&self) -> &str {
        "message-router"
    }

    async fn on_event(&self, bus: &EventBus, event: &BusEvent) {
        let BusEvent::MessageReceived {
            session_id,
            payload,
        } = event
        else {
            return;
        };

        match route(session_id, payload, &self.sent) {
            Route::Inbound(message) => bus.publish(BusEvent::InboundMessage(message)).await,
            Route::ManualOutbound(message) => {
                if self.is_late_echo(&message).await {
                    debug!(session_id = %session_id, "dropping own echo that beat its send receipt");
                    return;
                }
                debug!(
                    session_id = %session_id,
                    counterpart = %message.counterpart,
                    "manual outbound message detected"
                );
                bus.publish(BusEvent::ManualOutboundDetected(message)).await
            }
            Route::Drop(reason) => {
                debug!(session_id = %session_id, ?reason, "dropping transport message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sid() -> SessionId {
        SessionId("tenant-1".into())
    }

    fn envelope(chat: &str, from_me: bool, message: Value) -> Value {
        json!({
            "key": {"remoteJid": chat, "fromMe": from_me, "id": "MSG1"},
            "pushName": "Ana",
            "message": message,
        })
    }

    const CUSTOMER: &str = "5511988887777@s.whatsapp.net";

    #[test]
    fn plain_conversation_is_inbound_text() {
        let payload = envelope(CUSTOMER, false, json!({"conversation": "Oi, tudo bem?"}));
        let Route::Inbound(msg) = route(&sid(), &payload, &SentLedger::new()) else {
            panic!("expected inbound");
        };
        assert_eq!(msg.kind, ContentKind::Text);
        assert_eq!(msg.text, "Oi, tudo bem?");
        assert_eq!(msg.counterpart, CUSTOMER);
        assert_eq!(msg.push_name.as_deref(), Some("Ana"));
        assert_eq!(msg.transport_message_id.as_deref(), Some("MSG1"));
        assert_eq!(msg.raw, payload);
    }

    #[test]
    fn drops_status_broadcast_and_groups() {
        let ledger = SentLedger::new();
        let status = envelope("status@broadcast", false, json!({"conversation": "x"}));
        let group = envelope("120363@g.us", false, json!({"conversation": "x"}));
        assert_eq!(
            route(&sid(), &status, &ledger),
            Route::Drop(DropReason::Broadcast)
        );
        assert_eq!(route(&sid(), &group, &ledger), Route::Drop(DropReason::Group));
    }

    #[test]
    fn drops_control_frames() {
        let ledger = SentLedger::new();
        for frame in CONTROL_FRAMES {
            let payload = envelope(CUSTOMER, false, json!({ *frame: {"type": 0} }));
            assert_eq!(
                route(&sid(), &payload, &ledger),
                Route::Drop(DropReason::ControlFrame),
                "{frame}"
            );
        }
    }

    #[test]
    fn drops_missing_or_empty_content() {
        let ledger = SentLedger::new();
        let missing = json!({"key": {"remoteJid": CUSTOMER, "fromMe": false, "id": "1"}});
        let null = envelope(CUSTOMER, false, Value::Null);
        let empty = envelope(CUSTOMER, false, json!({}));
        for payload in [missing, null, empty] {
            assert_eq!(
                route(&sid(), &payload, &ledger),
                Route::Drop(DropReason::NoContent)
            );
        }
    }

    #[test]
    fn drops_payload_without_chat() {
        let payload = json!({"message": {"conversation": "x"}});
        assert_eq!(
            route(&sid(), &payload, &SentLedger::new()),
            Route::Drop(DropReason::MissingChat)
        );
    }

    #[test]
    fn classification_precedence() {
        assert_eq!(
            classify(&json!({"extendedTextMessage": {"text": "link https://x"}})),
            (ContentKind::Text, "link https://x".into())
        );
        assert_eq!(
            classify(&json!({"imageMessage": {"caption": "olha"}})),
            (ContentKind::Image, "olha".into())
        );
        assert_eq!(
            classify(&json!({"imageMessage": {}})),
            (ContentKind::Image, String::new())
        );
        assert_eq!(
            classify(&json!({"audioMessage": {"seconds": 4}})),
            (ContentKind::Audio, String::new())
        );
        assert_eq!(
            classify(&json!({"documentMessage": {"fileName": "tabela.pdf"}})),
            (ContentKind::File, "tabela.pdf".into())
        );
        // conversation wins over everything else
        assert_eq!(
            classify(&json!({"conversation": "a", "imageMessage": {"caption": "b"}})),
            (ContentKind::Text, "a".into())
        );
    }

    #[test]
    fn unknown_shape_defaults_to_empty_text() {
        assert_eq!(
            classify(&json!({"stickerMessage": {"url": "x"}})),
            (ContentKind::Text, String::new())
        );
    }

    #[test]
    fn unwraps_ephemeral_envelopes() {
        let payload = envelope(
            CUSTOMER,
            false,
            json!({"ephemeralMessage": {"message": {"extendedTextMessage": {"text": "sumindo"}}}}),
        );
        let Route::Inbound(msg) = route(&sid(), &payload, &SentLedger::new()) else {
            panic!("expected inbound");
        };
        assert_eq!(msg.text, "sumindo");
    }

    #[test]
    fn own_account_send_is_manual_outbound() {
        let payload = envelope(CUSTOMER, true, json!({"conversation": "Oi, aqui é a Ana"}));
        let Route::ManualOutbound(msg) = route(&sid(), &payload, &SentLedger::new()) else {
            panic!("expected manual outbound");
        };
        assert!(msg.from_me);
        assert_eq!(msg.counterpart, CUSTOMER);
    }

    #[test]
    fn echo_of_automated_send_is_dropped() {
        let ledger = SentLedger::new();
        ledger.record("MSG1");
        let payload = envelope(CUSTOMER, true, json!({"conversation": "resposta automática"}));
        assert_eq!(
            route(&sid(), &payload, &ledger),
            Route::Drop(DropReason::OwnEcho)
        );
    }
}
