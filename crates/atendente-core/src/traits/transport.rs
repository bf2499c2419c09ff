// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluggable messaging transport.
//!
//! The session registry only sees these traits. Concrete transports never
//! leak their library types into the core.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::AtendenteError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    CredentialSnapshot, MediaBlob, Presence, SentReceipt, SessionId, TransportEvent,
};

/// A freshly opened socket: its command handle plus the event stream it produces.
pub struct TransportConnection {
    pub handle: Arc<dyn TransportHandle>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens transport sockets.
#[async_trait]
pub trait TransportAdapter: PluginAdapter {
    /// Opens a socket for `session_id`, authenticating with `credentials`
    /// when present. An empty snapshot starts a new pairing.
    async fn connect(
        &self,
        session_id: &SessionId,
        credentials: CredentialSnapshot,
    ) -> Result<TransportConnection, AtendenteError>;
}

/// Commands accepted by one open socket.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    async fn send_text(&self, recipient: &str, text: &str)
    -> Result<SentReceipt, AtendenteError>;

    async fn set_presence(&self, recipient: &str, presence: Presence)
    -> Result<(), AtendenteError>;

    async fn download_media(&self, raw: &serde_json::Value) -> Result<MediaBlob, AtendenteError>;

    /// Invalidates the credentials on the remote side.
    async fn logout(&self) -> Result<(), AtendenteError>;

    /// Closes the socket locally. Must be idempotent.
    async fn close(&self);
}
