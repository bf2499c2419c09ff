// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound sender that records every call with its (tokio) timestamp.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::time::Instant;

use atendente_core::AtendenteError;
use atendente_core::traits::OutboundSender;
use atendente_core::types::{MediaBlob, Presence, SentReceipt, SessionId};

#[derive(Debug, Clone, PartialEq)]
pub enum SenderCall {
    Presence {
        session_id: SessionId,
        recipient: String,
        presence: Presence,
    },
    Text {
        session_id: SessionId,
        recipient: String,
        text: String,
    },
}

pub struct MockSender {
    calls: Mutex<Vec<(Instant, SenderCall)>>,
    next_id: AtomicUsize,
    sent_ids: Mutex<Vec<String>>,
    fail_sends: AtomicBool,
    media: Mutex<Option<MediaBlob>>,
}

impl MockSender {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            sent_ids: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            media: Mutex::new(None),
        }
    }

    /// Every call in order.
    pub fn calls(&self) -> Vec<SenderCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Every call with the instant it was made.
    pub fn timed_calls(&self) -> Vec<(Instant, SenderCall)> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts sent, in order.
    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SenderCall::Text { text, .. } => Some(text),
                SenderCall::Presence { .. } => None,
            })
            .collect()
    }

    /// Message ids returned by successful sends, in order.
    pub fn sent_ids(&self) -> Vec<String> {
        self.sent_ids.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Media returned by `download_media`. Without it, downloads fail.
    pub fn set_media(&self, media: MediaBlob) {
        *self.media.lock().unwrap() = Some(media);
    }

    fn record(&self, call: SenderCall) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

impl Default for MockSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutboundSender for MockSender {
    async fn send_text(
        &self,
        session_id: &SessionId,
        recipient: &str,
        text: &str,
    ) -> Result<SentReceipt, AtendenteError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(AtendenteError::SessionNotFound(session_id.to_string()));
        }
        self.record(SenderCall::Text {
            session_id: session_id.clone(),
            recipient: recipient.to_string(),
            text: text.to_string(),
        });
        let id = format!("SENT{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent_ids.lock().unwrap().push(id.clone());
        Ok(SentReceipt {
            message_id: Some(id),
        })
    }

    fn sent_by_automation(&self, message_id: &str) -> bool {
        self.sent_ids.lock().unwrap().iter().any(|id| id == message_id)
    }

    async fn set_presence(
        &self,
        session_id: &SessionId,
        recipient: &str,
        presence: Presence,
    ) -> Result<(), AtendenteError> {
        self.record(SenderCall::Presence {
            session_id: session_id.clone(),
            recipient: recipient.to_string(),
            presence,
        });
        Ok(())
    }

    async fn download_media(
        &self,
        session_id: &SessionId,
        _raw: &serde_json::Value,
    ) -> Result<MediaBlob, AtendenteError> {
        self.media
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AtendenteError::transport(format!("no media for {session_id}")))
    }
}
