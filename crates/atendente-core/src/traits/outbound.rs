// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound sender interface consumed by the automation layer.
//!
//! The automation layer only depends on this trait. The session registry
//! implements it, and the composition root wires the two together.

use async_trait::async_trait;

use crate::error::AtendenteError;
use crate::types::{MediaBlob, Presence, SentReceipt, SessionId};

#[async_trait]
pub trait OutboundSender: Send + Sync {
    /// Sends a text message. Fails with `SessionNotFound` when the session
    /// has no connected socket.
    async fn send_text(
        &self,
        session_id: &SessionId,
        recipient: &str,
        text: &str,
    ) -> Result<SentReceipt, AtendenteError>;

    async fn set_presence(
        &self,
        session_id: &SessionId,
        recipient: &str,
        presence: Presence,
    ) -> Result<(), AtendenteError>;

    /// True when `message_id` belongs to a message this sender delivered,
    /// as opposed to one typed by a human on the tenant's account.
    fn sent_by_automation(&self, message_id: &str) -> bool;

    /// Downloads the media attached to a raw inbound payload.
    async fn download_media(
        &self,
        session_id: &SessionId,
        raw: &serde_json::Value,
    ) -> Result<MediaBlob, AtendenteError>;
}
