// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messaging bridge transport for Atendente.
//!
//! The messaging network itself is spoken by an external bridge process.
//! Each session opens one WebSocket to the bridge, announces itself with a
//! `hello` frame carrying its stored credentials, and from then on exchanges
//! the JSON frames described in [`protocol`].

pub mod connection;
pub mod protocol;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atendente_config::model::TransportConfig;
use atendente_core::AtendenteError;
use atendente_core::traits::{PluginAdapter, TransportAdapter, TransportConnection};
use atendente_core::types::{AdapterType, CredentialSnapshot, HealthStatus, SessionId};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub use crate::connection::BridgeHandle;
use crate::protocol::ClientFrame;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens bridge sockets.
#[derive(Debug, Clone)]
pub struct BridgeTransport {
    url: String,
    auth_token: Option<String>,
    event_buffer: usize,
    request_timeout: Duration,
}

impl BridgeTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            event_buffer: 256,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            url: config.bridge_url.clone(),
            auth_token: config.auth_token.clone(),
            event_buffer: config.event_buffer.max(1),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// How long a send, presence, download or logout waits for the bridge's reply.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PluginAdapter for BridgeTransport {
    fn name(&self) -> &str {
        "bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, AtendenteError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), AtendenteError> {
        Ok(())
    }
}

#[async_trait]
impl TransportAdapter for BridgeTransport {
    async fn connect(
        &self,
        session_id: &SessionId,
        credentials: CredentialSnapshot,
    ) -> Result<TransportConnection, AtendenteError> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| AtendenteError::Transport {
                message: format!("failed to reach bridge at {}", self.url),
                source: Some(Box::new(e)),
            })?;
        debug!(session_id = %session_id, url = %self.url, "bridge socket opened");

        let (sink, stream) = socket.split();
        let (events_tx, events_rx) = mpsc::channel(self.event_buffer);
        let handle = BridgeHandle::spawn(
            session_id.clone(),
            sink,
            stream,
            events_tx,
            self.request_timeout,
        );

        let resumed = !credentials.is_empty();
        handle
            .send_frame(&ClientFrame::Hello {
                session_id: session_id.to_string(),
                credentials,
                token: self.auth_token.clone(),
            })
            .await?;
        info!(session_id = %session_id, resumed, "bridge session announced");

        Ok(TransportConnection {
            handle: Arc::new(handle),
            events: events_rx,
        })
    }
}
