// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery with typing simulation.
//!
//! Long replies are split at the latest natural break that fits, and every
//! segment goes out as `composing` presence, a typing delay proportional to
//! its length, the send itself, then `paused` presence. Only the full reply
//! is persisted, never the individual segments.

use std::sync::Arc;
use std::time::Duration;

use atendente_config::model::DeliveryConfig;
use atendente_core::types::{
    ContentKind, ConversationId, Direction, DomainMessage, Originator, Presence, SessionId,
};
use atendente_core::{AtendenteError, ConversationStore, OutboundSender};
use tracing::{debug, info, warn};

/// Break points tried in order. The flag says whether the separator's first
/// character stays with the preceding segment.
const BREAKS: &[(&str, bool)] = &[("\n\n", false), (". ", true), (", ", true), (" ", false)];

/// Splits `text` into segments of at most `max_len` characters.
///
/// Each cut happens at the last paragraph break, sentence end, comma or
/// space inside the limit, provided it falls in the second half of the
/// window. Otherwise the text is cut hard at the limit. Whitespace around
/// cuts is dropped.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut segments = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let Some((limit, _)) = rest.char_indices().nth(max_len) else {
            segments.push(rest.to_string());
            break;
        };
        let window = &rest[..limit];
        let cut = natural_break(window, max_len / 2).unwrap_or(limit);
        let segment = rest[..cut].trim_end();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    segments
}

/// Byte offset of the latest acceptable break in `window`.
fn natural_break(window: &str, min_chars: usize) -> Option<usize> {
    BREAKS.iter().find_map(|(separator, keep_first)| {
        let at = window.rfind(separator)?;
        let cut = if *keep_first { at + 1 } else { at };
        (cut > 0 && window[..cut].chars().count() >= min_chars).then_some(cut)
    })
}

/// Sends replies segment by segment and records them.
#[derive(Clone)]
pub struct OutboundPacer {
    sender: Arc<dyn OutboundSender>,
    store: Arc<dyn ConversationStore>,
    config: DeliveryConfig,
}

impl OutboundPacer {
    pub fn new(
        sender: Arc<dyn OutboundSender>,
        store: Arc<dyn ConversationStore>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            sender,
            store,
            config,
        }
    }

    /// True when `message_id` came back from one of our own sends.
    pub fn sent_by_automation(&self, message_id: &str) -> bool {
        self.sender.sent_by_automation(message_id)
    }

    /// Typing delay shown before a segment of `chars` characters.
    pub fn typing_delay(&self, chars: usize) -> Duration {
        let ms = (chars as u64)
            .saturating_mul(self.config.typing_ms_per_char)
            .min(self.config.max_typing_delay_ms);
        Duration::from_millis(ms)
    }

    /// Delivers `text` and persists it as one automation message.
    ///
    /// Returns `None` when there was nothing to send. A failed send stops the
    /// delivery and nothing is persisted. Presence failures are only logged.
    pub async fn deliver(
        &self,
        session_id: &SessionId,
        conversation_id: &ConversationId,
        recipient: &str,
        text: &str,
    ) -> Result<Option<DomainMessage>, AtendenteError> {
        let segments = split_message(text, self.config.max_segment_length);
        if segments.is_empty() {
            return Ok(None);
        }

        let gap = Duration::from_millis(self.config.segment_gap_ms);
        let mut first_id = None;
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(gap).await;
            }
            self.presence(session_id, recipient, Presence::Composing).await;
            tokio::time::sleep(self.typing_delay(segment.chars().count())).await;

            let receipt = self
                .sender
                .send_text(session_id, recipient, segment)
                .await
                .inspect_err(|e| {
                    warn!(
                        session_id = %session_id,
                        conversation_id = %conversation_id,
                        segment = i + 1,
                        total = segments.len(),
                        error = %e,
                        "segment send failed, abandoning delivery"
                    );
                })?;
            if first_id.is_none() {
                first_id = receipt.message_id;
            }

            self.presence(session_id, recipient, Presence::Paused).await;
        }

        let mut message = DomainMessage::new(
            conversation_id.clone(),
            Direction::Outbound,
            Originator::Automation,
            ContentKind::Text,
            text.trim(),
        );
        message.transport_message_id = first_id;
        self.store.insert_message(&message).await?;

        info!(
            session_id = %session_id,
            conversation_id = %conversation_id,
            segments = segments.len(),
            chars = message.text.chars().count(),
            "reply delivered"
        );
        Ok(Some(message))
    }

    async fn presence(&self, session_id: &SessionId, recipient: &str, presence: Presence) {
        if let Err(e) = self.sender.set_presence(session_id, recipient, presence).await {
            debug!(session_id = %session_id, %presence, error = %e, "presence update failed");
        }
    }
}
