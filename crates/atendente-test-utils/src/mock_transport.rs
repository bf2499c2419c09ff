// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for session registry tests.
//!
//! Every `connect` opens a fake socket whose event stream is fed through
//! [`MockTransport::emit`]. Sends, presence updates, logouts and closes are
//! captured on the [`MockTransportHandle`] for assertions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use atendente_core::AtendenteError;
use atendente_core::traits::{PluginAdapter, TransportAdapter, TransportConnection, TransportHandle};
use atendente_core::types::{
    AdapterType, CredentialSnapshot, HealthStatus, MediaBlob, Presence, SentReceipt, SessionId,
    TransportEvent,
};

#[derive(Default)]
struct TransportState {
    connects: Vec<(SessionId, CredentialSnapshot)>,
    failures_left: usize,
    sockets: HashMap<SessionId, (Arc<MockTransportHandle>, mpsc::Sender<TransportEvent>)>,
}

#[derive(Default)]
pub struct MockTransport {
    state: Mutex<TransportState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` connect attempts fail with a transport error.
    pub fn fail_next_connects(&self, count: usize) {
        self.state.lock().unwrap().failures_left = count;
    }

    /// Connect attempts so far, including failed ones.
    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects.len()
    }

    /// Credentials passed to the most recent connect for `session_id`.
    pub fn last_credentials(&self, session_id: &SessionId) -> Option<CredentialSnapshot> {
        self.state
            .lock()
            .unwrap()
            .connects
            .iter()
            .rev()
            .find(|(id, _)| id == session_id)
            .map(|(_, creds)| creds.clone())
    }

    /// Handle of the most recent socket opened for `session_id`.
    pub fn handle(&self, session_id: &SessionId) -> Option<Arc<MockTransportHandle>> {
        self.state
            .lock()
            .unwrap()
            .sockets
            .get(session_id)
            .map(|(handle, _)| handle.clone())
    }

    /// Feeds an event into the most recent socket for `session_id`.
    ///
    /// Returns false if there is no socket or its event stream was dropped.
    pub async fn emit(&self, session_id: &SessionId, event: TransportEvent) -> bool {
        let sender = self
            .state
            .lock()
            .unwrap()
            .sockets
            .get(session_id)
            .map(|(_, tx)| tx.clone());
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock-transport"
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
impl TransportAdapter for MockTransport {
    async fn connect(
        &self,
        session_id: &SessionId,
        credentials: CredentialSnapshot,
    ) -> Result<TransportConnection, AtendenteError> {
        let mut state = self.state.lock().unwrap();
        state.connects.push((session_id.clone(), credentials));
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(AtendenteError::transport("mock connect refused"));
        }

        let (tx, rx) = mpsc::channel(64);
        let handle = Arc::new(MockTransportHandle::new(tx.clone()));
        state
            .sockets
            .insert(session_id.clone(), (handle.clone(), tx));
        Ok(TransportConnection {
            handle,
            events: rx,
        })
    }
}

/// Captures every command sent to one fake socket.
pub struct MockTransportHandle {
    sent: Mutex<Vec<(String, String)>>,
    presence: Mutex<Vec<(String, Presence)>>,
    next_id: AtomicUsize,
    closed: AtomicUsize,
    logged_out: AtomicBool,
    fail_logout: AtomicBool,
    echo_sends: AtomicBool,
    events: mpsc::Sender<TransportEvent>,
}

impl MockTransportHandle {
    fn new(events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            presence: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            closed: AtomicUsize::new(0),
            logged_out: AtomicBool::new(false),
            fail_logout: AtomicBool::new(false),
            echo_sends: AtomicBool::new(false),
            events,
        }
    }

    /// `(recipient, text)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn presence_updates(&self) -> Vec<(String, Presence)> {
        self.presence.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) > 0
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    pub fn fail_logout(&self, fail: bool) {
        self.fail_logout.store(fail, Ordering::SeqCst);
    }

    /// Makes every send echo itself as an own message on the event stream
    /// a moment before its receipt is returned, like a slow ack.
    pub fn echo_sends(&self, echo: bool) {
        self.echo_sends.store(echo, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransportHandle for MockTransportHandle {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<SentReceipt, AtendenteError> {
        if self.is_closed() {
            return Err(AtendenteError::transport("socket closed"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        let id = format!("MOCK{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        if self.echo_sends.load(Ordering::SeqCst) {
            let echo = serde_json::json!({
                "key": {"remoteJid": recipient, "fromMe": true, "id": id},
                "message": {"conversation": text}
            });
            let _ = self.events.send(TransportEvent::Messages(vec![echo])).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(SentReceipt {
            message_id: Some(id),
        })
    }

    async fn set_presence(&self, recipient: &str, presence: Presence) -> Result<(), AtendenteError> {
        self.presence
            .lock()
            .unwrap()
            .push((recipient.to_string(), presence));
        Ok(())
    }

    async fn download_media(&self, _raw: &serde_json::Value) -> Result<MediaBlob, AtendenteError> {
        Ok(MediaBlob {
            mime_type: "application/octet-stream".into(),
            data: vec![0, 1, 2, 3],
        })
    }

    async fn logout(&self) -> Result<(), AtendenteError> {
        if self.fail_logout.load(Ordering::SeqCst) {
            return Err(AtendenteError::transport("mock logout failed"));
        }
        self.logged_out.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}
