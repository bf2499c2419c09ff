// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry and per-session connection state machine.
//!
//! ```text
//! connecting -> (waiting_qr -> connecting)* -> connected
//! any state  -> disconnected            on transport close
//! disconnected -> connecting            after the reconnect delay,
//!                                       unless the close was a logout
//! ```
//!
//! The registry owns exactly one socket per session id. Every slot carries a
//! generation number; background tasks (event pump, reconnect timer) only act
//! while their generation is still the slot's current one, so a replaced
//! socket can never touch its successor's state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use atendente_bus::{BusEvent, EventBus};
use atendente_config::model::TransportConfig;
use atendente_core::traits::storage::CredentialScope;
use atendente_core::types::{
    CloseReason, CredentialSnapshot, MediaBlob, Presence, SentReceipt, SessionId, SessionStatus,
    TransportEvent,
};
use atendente_core::{
    AtendenteError, CredentialStore, OutboundSender, TransportAdapter, TransportHandle,
};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::ledger::SentLedger;

/// Credential keys that are never persisted.
const EPHEMERAL_CREDENTIAL_PREFIXES: &[&str] = &["app-state-sync-key", "app-state-sync-version"];

/// Returns true when a credential key must not be written to the store.
pub fn is_ephemeral_credential(key: &str) -> bool {
    EPHEMERAL_CREDENTIAL_PREFIXES
        .iter()
        .any(|prefix| key.starts_with(prefix))
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Wait between a non-logout close and the next connect attempt.
    pub reconnect_delay: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

impl From<&TransportConfig> for RegistryConfig {
    fn from(config: &TransportConfig) -> Self {
        Self {
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
        }
    }
}

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub last_pairing_code: Option<String>,
}

struct SessionSlot {
    generation: u64,
    status: SessionStatus,
    last_pairing_code: Option<String>,
    handle: Option<Arc<dyn TransportHandle>>,
    pump: Option<AbortHandle>,
    reconnect: Option<AbortHandle>,
}

impl SessionSlot {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            status: SessionStatus::Connecting,
            last_pairing_code: None,
            handle: None,
            pump: None,
            reconnect: None,
        }
    }

    fn info(&self, session_id: &SessionId) -> SessionInfo {
        SessionInfo {
            session_id: session_id.clone(),
            status: self.status,
            last_pairing_code: self.last_pairing_code.clone(),
        }
    }

    /// Stops background tasks and hands back the socket for closing.
    fn dismantle(mut self) -> Option<Arc<dyn TransportHandle>> {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(reconnect) = self.reconnect.take() {
            reconnect.abort();
        }
        self.handle.take()
    }
}

struct Inner {
    transport: Arc<dyn TransportAdapter>,
    credentials: Arc<dyn CredentialStore>,
    bus: Arc<EventBus>,
    config: RegistryConfig,
    sent: Arc<SentLedger>,
    slots: Mutex<HashMap<SessionId, SessionSlot>>,
    generations: AtomicU64,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<SessionId, SessionSlot>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn is_current(&self, session_id: &SessionId, generation: u64) -> bool {
        self.slots()
            .get(session_id)
            .is_some_and(|slot| slot.generation == generation)
    }

    /// Applies `update` to the slot if `generation` is still current.
    fn with_current<R>(
        &self,
        session_id: &SessionId,
        generation: u64,
        update: impl FnOnce(&mut SessionSlot) -> R,
    ) -> Option<R> {
        let mut slots = self.slots();
        match slots.get_mut(session_id) {
            Some(slot) if slot.generation == generation => Some(update(slot)),
            _ => None,
        }
    }

    async fn publish_status(&self, session_id: &SessionId, status: SessionStatus) {
        self.bus
            .publish(BusEvent::ConnectionStateChanged {
                session_id: session_id.clone(),
                status,
            })
            .await;
    }

    /// Handle of a connected session, or `SessionNotFound`.
    fn connected_handle(
        &self,
        session_id: &SessionId,
    ) -> Result<Arc<dyn TransportHandle>, AtendenteError> {
        let slots = self.slots();
        match slots.get(session_id) {
            Some(SessionSlot {
                status: SessionStatus::Connected,
                handle: Some(handle),
                ..
            }) => Ok(handle.clone()),
            _ => Err(AtendenteError::SessionNotFound(session_id.to_string())),
        }
    }
}

/// Owns every transport socket and drives each session's state machine.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    pub fn new(
        transport: Arc<dyn TransportAdapter>,
        credentials: Arc<dyn CredentialStore>,
        bus: Arc<EventBus>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                credentials,
                bus,
                config,
                sent: Arc::new(SentLedger::new()),
                slots: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(1),
            }),
        }
    }

    /// Ids of messages this service sent, shared with the router.
    pub fn sent_ledger(&self) -> Arc<SentLedger> {
        self.inner.sent.clone()
    }

    /// Starts a session.
    ///
    /// Without `force_new`, an existing session is returned untouched.
    /// Otherwise any existing socket is torn down before a new one opens.
    /// A failed connect leaves the session `disconnected` with a reconnect
    /// scheduled, and returns the error.
    pub async fn start(
        &self,
        session_id: &SessionId,
        force_new: bool,
    ) -> Result<SessionInfo, AtendenteError> {
        open_session(self.inner.clone(), session_id.clone(), force_new).await
    }

    pub fn get_status(&self, session_id: &SessionId) -> Option<SessionStatus> {
        self.inner.slots().get(session_id).map(|slot| slot.status)
    }

    pub fn get_last_pairing_code(&self, session_id: &SessionId) -> Option<String> {
        self.inner
            .slots()
            .get(session_id)
            .and_then(|slot| slot.last_pairing_code.clone())
    }

    pub fn get_info(&self, session_id: &SessionId) -> Option<SessionInfo> {
        self.inner
            .slots()
            .get(session_id)
            .map(|slot| slot.info(session_id))
    }

    /// Every session currently held, sorted by id.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .inner
            .slots()
            .iter()
            .map(|(id, slot)| slot.info(id))
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        sessions
    }

    /// Sends a text message over a connected session.
    pub async fn send(
        &self,
        session_id: &SessionId,
        recipient: &str,
        text: &str,
    ) -> Result<SentReceipt, AtendenteError> {
        let handle = self.inner.connected_handle(session_id)?;
        let _pending = self.inner.sent.begin_send(session_id.as_str(), recipient);
        let receipt = handle.send_text(recipient, text).await?;
        if let Some(id) = &receipt.message_id {
            self.inner.sent.record(id);
        }
        metrics::counter!("atendente_messages_sent_total").increment(1);
        Ok(receipt)
    }

    /// Logs out (best effort), tears down the socket and purges credentials.
    ///
    /// Local state and stored credentials are removed even when the remote
    /// logout fails or the session is unknown.
    pub async fn disconnect(&self, session_id: &SessionId) -> Result<(), AtendenteError> {
        let slot = self.inner.slots().remove(session_id);
        let handle = slot.and_then(SessionSlot::dismantle);

        if let Some(handle) = handle {
            if let Err(e) = handle.logout().await {
                warn!(session_id = %session_id, error = %e, "transport logout failed, continuing teardown");
            }
            handle.close().await;
        }

        self.inner
            .credentials
            .delete(session_id.as_str(), CredentialScope::All)
            .await?;
        info!(session_id = %session_id, "session disconnected and credentials purged");
        self.inner
            .publish_status(session_id, SessionStatus::Disconnected)
            .await;
        Ok(())
    }

    /// Starts every session that has stored credentials.
    ///
    /// Returns the number of sessions that connected without error.
    pub async fn restore(&self) -> Result<usize, AtendenteError> {
        let sessions = self.inner.credentials.sessions().await?;
        let mut restored = 0;
        for id in sessions {
            let session_id = SessionId(id);
            match self.start(&session_id, false).await {
                Ok(_) => restored += 1,
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "session restore failed, reconnect scheduled")
                }
            }
        }
        info!(restored, "restored sessions from stored credentials");
        Ok(restored)
    }

    /// Closes every socket without logging out. Credentials stay stored.
    pub async fn shutdown(&self) {
        let slots: Vec<(SessionId, SessionSlot)> = self.inner.slots().drain().collect();
        for (session_id, slot) in slots {
            if let Some(handle) = slot.dismantle() {
                handle.close().await;
            }
            debug!(session_id = %session_id, "session closed for shutdown");
        }
    }
}

#[async_trait]
impl OutboundSender for SessionRegistry {
    async fn send_text(
        &self,
        session_id: &SessionId,
        recipient: &str,
        text: &str,
    ) -> Result<SentReceipt, AtendenteError> {
        self.send(session_id, recipient, text).await
    }

    fn sent_by_automation(&self, message_id: &str) -> bool {
        self.inner.sent.contains(message_id)
    }

    async fn set_presence(
        &self,
        session_id: &SessionId,
        recipient: &str,
        presence: Presence,
    ) -> Result<(), AtendenteError> {
        let handle = self.inner.connected_handle(session_id)?;
        handle.set_presence(recipient, presence).await
    }

    async fn download_media(
        &self,
        session_id: &SessionId,
        raw: &serde_json::Value,
    ) -> Result<MediaBlob, AtendenteError> {
        let handle = self.inner.connected_handle(session_id)?;
        handle.download_media(raw).await
    }
}

/// Replaces (or reuses) the slot for `session_id` and opens a socket.
async fn open_session(
    inner: Arc<Inner>,
    session_id: SessionId,
    force_new: bool,
) -> Result<SessionInfo, AtendenteError> {
    let generation = inner.generations.fetch_add(1, Ordering::Relaxed);
    let previous = {
        let mut slots = inner.slots();
        if !force_new && let Some(existing) = slots.get(&session_id) {
            return Ok(existing.info(&session_id));
        }
        slots.insert(session_id.clone(), SessionSlot::new(generation))
    };

    if let Some(handle) = previous.and_then(SessionSlot::dismantle) {
        debug!(session_id = %session_id, "closing previous socket");
        handle.close().await;
    }

    info!(session_id = %session_id, generation, "session connecting");
    inner
        .publish_status(&session_id, SessionStatus::Connecting)
        .await;

    if let Err(e) = connect(&inner, &session_id, generation).await {
        warn!(session_id = %session_id, error = %e, "connect failed");
        mark_disconnected(&inner, &session_id, generation).await;
        schedule_reconnect(&inner, &session_id, generation);
        return Err(e);
    }

    inner
        .slots()
        .get(&session_id)
        .map(|slot| slot.info(&session_id))
        .ok_or_else(|| AtendenteError::SessionNotFound(session_id.to_string()))
}

/// Opens the socket and attaches it plus its pump to the current slot.
async fn connect(
    inner: &Arc<Inner>,
    session_id: &SessionId,
    generation: u64,
) -> Result<(), AtendenteError> {
    let credentials = inner.credentials.load_all(session_id.as_str()).await?;
    let connection = inner.transport.connect(session_id, credentials).await?;

    let handle = connection.handle.clone();
    let pump = tokio::spawn(pump_events(
        inner.clone(),
        session_id.clone(),
        generation,
        connection.events,
    ));

    let attached = inner.with_current(session_id, generation, |slot| {
        slot.handle = Some(connection.handle);
        slot.pump = Some(pump.abort_handle());
    });

    if attached.is_none() {
        debug!(session_id = %session_id, generation, "connect superseded, closing new socket");
        pump.abort();
        handle.close().await;
    }
    Ok(())
}

async fn mark_disconnected(inner: &Arc<Inner>, session_id: &SessionId, generation: u64) {
    let changed = inner.with_current(session_id, generation, |slot| {
        slot.status = SessionStatus::Disconnected;
        slot.handle.take()
    });
    if let Some(handle) = changed {
        if let Some(handle) = handle {
            handle.close().await;
        }
        inner
            .publish_status(session_id, SessionStatus::Disconnected)
            .await;
    }
}

/// Arms the reconnect timer for the slot, if it is still current.
fn schedule_reconnect(inner: &Arc<Inner>, session_id: &SessionId, generation: u64) {
    let delay = inner.config.reconnect_delay;
    let task_inner = inner.clone();
    let task_session = session_id.clone();
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        // Detach our own handle from the slot so the teardown inside
        // `open_session` does not abort this very task.
        let still_current = task_inner
            .with_current(&task_session, generation, |slot| {
                slot.reconnect.take();
                slot.status == SessionStatus::Disconnected
            })
            .unwrap_or(false);
        if !still_current {
            return;
        }

        metrics::counter!("atendente_reconnects_total").increment(1);
        info!(session_id = %task_session, "reconnecting");
        if let Err(e) = open_session(task_inner, task_session.clone(), true).await {
            debug!(session_id = %task_session, error = %e, "reconnect attempt failed");
        }
    });

    let abort = task.abort_handle();
    let stored = inner.with_current(session_id, generation, |slot| {
        if let Some(old) = slot.reconnect.replace(abort) {
            old.abort();
        }
    });
    if stored.is_none() {
        task.abort();
    }
}

/// Drives one socket's events until it closes or is superseded.
async fn pump_events(
    inner: Arc<Inner>,
    session_id: SessionId,
    generation: u64,
    mut events: mpsc::Receiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        if !inner.is_current(&session_id, generation) {
            debug!(session_id = %session_id, generation, "dropping events of a replaced socket");
            return;
        }

        match event {
            TransportEvent::PairingCode(code) => {
                let updated = inner.with_current(&session_id, generation, |slot| {
                    slot.status = SessionStatus::WaitingQr;
                    slot.last_pairing_code = Some(code.clone());
                });
                if updated.is_some() {
                    info!(session_id = %session_id, "pairing code available");
                    inner
                        .bus
                        .publish(BusEvent::PairingCodeAvailable {
                            session_id: session_id.clone(),
                            code,
                        })
                        .await;
                    inner
                        .publish_status(&session_id, SessionStatus::WaitingQr)
                        .await;
                }
            }
            TransportEvent::Connecting => {
                transition(&inner, &session_id, generation, SessionStatus::Connecting).await;
            }
            TransportEvent::Open => {
                let updated = inner.with_current(&session_id, generation, |slot| {
                    slot.last_pairing_code = None;
                });
                if updated.is_some() {
                    info!(session_id = %session_id, "session connected");
                    transition(&inner, &session_id, generation, SessionStatus::Connected).await;
                }
            }
            TransportEvent::CredentialsUpdated(update) => {
                persist_credentials(&inner, &session_id, update).await;
            }
            TransportEvent::Messages(payloads) => {
                metrics::counter!("atendente_messages_received_total")
                    .increment(payloads.len() as u64);
                for payload in payloads {
                    inner
                        .bus
                        .publish(BusEvent::MessageReceived {
                            session_id: session_id.clone(),
                            payload,
                        })
                        .await;
                }
            }
            TransportEvent::Closed(reason) => {
                handle_close(&inner, &session_id, generation, reason).await;
                return;
            }
        }
    }

    handle_close(
        &inner,
        &session_id,
        generation,
        CloseReason::ConnectionLost("event stream ended".into()),
    )
    .await;
}

async fn transition(
    inner: &Arc<Inner>,
    session_id: &SessionId,
    generation: u64,
    status: SessionStatus,
) {
    let changed = inner
        .with_current(session_id, generation, |slot| {
            let changed = slot.status != status;
            slot.status = status;
            changed
        })
        .unwrap_or(false);
    if changed {
        inner.publish_status(session_id, status).await;
    }
}

async fn handle_close(
    inner: &Arc<Inner>,
    session_id: &SessionId,
    generation: u64,
    reason: CloseReason,
) {
    match reason {
        CloseReason::LoggedOut => {
            let removed = {
                let mut slots = inner.slots();
                match slots.get(session_id) {
                    Some(slot) if slot.generation == generation => slots.remove(session_id),
                    _ => None,
                }
            };
            let Some(mut slot) = removed else {
                return;
            };
            // This task is the slot's pump; dropping the handle detaches it.
            slot.pump.take();
            if let Some(handle) = slot.dismantle() {
                handle.close().await;
            }
            if let Err(e) = inner
                .credentials
                .delete(session_id.as_str(), CredentialScope::All)
                .await
            {
                warn!(session_id = %session_id, error = %e, "failed to purge credentials after logout");
            }
            info!(session_id = %session_id, "session logged out, new pairing required");
            inner
                .publish_status(session_id, SessionStatus::Disconnected)
                .await;
        }
        CloseReason::ConnectionLost(detail) => {
            warn!(session_id = %session_id, reason = %detail, "connection lost");
            inner.with_current(session_id, generation, |slot| {
                slot.pump.take();
            });
            mark_disconnected(inner, session_id, generation).await;
            schedule_reconnect(inner, session_id, generation);
        }
    }
}

async fn persist_credentials(inner: &Arc<Inner>, session_id: &SessionId, update: CredentialSnapshot) {
    for (key, value) in update {
        if is_ephemeral_credential(&key) {
            continue;
        }
        let result = if value.is_null() {
            inner
                .credentials
                .delete(session_id.as_str(), CredentialScope::Key(key.clone()))
                .await
        } else {
            inner
                .credentials
                .write(session_id.as_str(), &key, &value)
                .await
        };
        if let Err(e) = result {
            warn!(session_id = %session_id, key = %key, error = %e, "failed to persist credential");
        }
    }
}
