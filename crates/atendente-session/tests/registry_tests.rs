// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry lifecycle tests against the mock transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use atendente_bus::{BusEvent, EventBus, EventSubscriber};
use atendente_core::AtendenteError;
use atendente_core::types::{CloseReason, SessionId, SessionStatus, TransportEvent};
use atendente_session::{MessageRouter, RegistryConfig, SessionRegistry};
use atendente_test_utils::{MemoryCredentialStore, MockTransport};
use serde_json::json;

/// Records every bus event for later assertions.
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<BusEvent>>,
}

impl Recorder {
    fn statuses(&self) -> Vec<SessionStatus> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BusEvent::ConnectionStateChanged { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(BusEvent::kind).collect()
    }

    fn inbound_texts(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                BusEvent::InboundMessage(msg) => Some(msg.text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSubscriber for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn on_event(&self, _bus: &EventBus, event: &BusEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct Fixture {
    registry: SessionRegistry,
    transport: Arc<MockTransport>,
    credentials: Arc<MemoryCredentialStore>,
    recorder: Arc<Recorder>,
}

fn fixture() -> Fixture {
    let transport = Arc::new(MockTransport::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    let bus = Arc::new(EventBus::new());
    let recorder = Arc::new(Recorder::default());
    let registry = SessionRegistry::new(
        transport.clone(),
        credentials.clone(),
        bus.clone(),
        RegistryConfig {
            reconnect_delay: Duration::from_secs(3),
        },
    );
    bus.subscribe(Arc::new(MessageRouter::new(registry.sent_ledger())));
    bus.subscribe(recorder.clone());
    Fixture {
        registry,
        transport,
        credentials,
        recorder,
    }
}

fn sid(id: &str) -> SessionId {
    SessionId(id.to_string())
}

/// Lets spawned tasks run until `check` holds, advancing paused time if needed.
async fn settle(check: impl Fn() -> bool) -> bool {
    for _ in 0..1000 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

async fn connected(f: &Fixture, id: &SessionId) {
    f.registry.start(id, false).await.unwrap();
    assert!(f.transport.emit(id, TransportEvent::Open).await);
    assert!(settle(|| f.registry.get_status(id) == Some(SessionStatus::Connected)).await);
}

#[tokio::test(start_paused = true)]
async fn start_reports_connecting() {
    let f = fixture();
    let info = f.registry.start(&sid("t1"), false).await.unwrap();
    assert_eq!(info.status, SessionStatus::Connecting);
    assert_eq!(info.last_pairing_code, None);
    assert_eq!(f.transport.connect_count(), 1);
    assert_eq!(f.recorder.statuses(), vec![SessionStatus::Connecting]);
}

#[tokio::test(start_paused = true)]
async fn start_is_idempotent_without_force() {
    let f = fixture();
    let id = sid("t1");
    connected(&f, &id).await;

    let info = f.registry.start(&id, false).await.unwrap();
    assert_eq!(info.status, SessionStatus::Connected);
    assert_eq!(f.transport.connect_count(), 1);
    assert!(!f.transport.handle(&id).unwrap().is_closed());
}

#[tokio::test(start_paused = true)]
async fn force_new_replaces_the_socket() {
    let f = fixture();
    let id = sid("t1");
    connected(&f, &id).await;
    let old = f.transport.handle(&id).unwrap();

    let info = f.registry.start(&id, true).await.unwrap();
    assert_eq!(info.status, SessionStatus::Connecting);
    assert!(old.is_closed());
    assert_eq!(f.transport.connect_count(), 2);
    assert_eq!(f.registry.list_sessions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn pairing_code_moves_to_waiting_qr() {
    let f = fixture();
    let id = sid("t1");
    f.registry.start(&id, false).await.unwrap();
    f.transport
        .emit(&id, TransportEvent::PairingCode("2@abc,def".into()))
        .await;
    assert!(settle(|| f.registry.get_status(&id) == Some(SessionStatus::WaitingQr)).await);
    assert_eq!(
        f.registry.get_last_pairing_code(&id).as_deref(),
        Some("2@abc,def")
    );
    assert!(f.recorder.kinds().contains(&"pairing_code_available"));

    // a rotated code replaces the previous one
    f.transport
        .emit(&id, TransportEvent::PairingCode("2@next".into()))
        .await;
    assert!(settle(|| f.registry.get_last_pairing_code(&id).as_deref() == Some("2@next")).await);

    f.transport.emit(&id, TransportEvent::Open).await;
    assert!(settle(|| f.registry.get_status(&id) == Some(SessionStatus::Connected)).await);
    assert_eq!(f.registry.get_last_pairing_code(&id), None);
}

#[tokio::test(start_paused = true)]
async fn send_requires_a_connected_session() {
    let f = fixture();
    let id = sid("t1");

    let err = f.registry.send(&id, "5511@s.whatsapp.net", "oi").await.unwrap_err();
    assert!(matches!(err, AtendenteError::SessionNotFound(_)));

    f.registry.start(&id, false).await.unwrap();
    let err = f.registry.send(&id, "5511@s.whatsapp.net", "oi").await.unwrap_err();
    assert!(matches!(err, AtendenteError::SessionNotFound(_)));

    f.transport.emit(&id, TransportEvent::Open).await;
    assert!(settle(|| f.registry.get_status(&id) == Some(SessionStatus::Connected)).await);
    let receipt = f.registry.send(&id, "5511@s.whatsapp.net", "oi").await.unwrap();
    assert!(receipt.message_id.is_some());
    assert_eq!(
        f.transport.handle(&id).unwrap().sent(),
        vec![("5511@s.whatsapp.net".to_string(), "oi".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn credential_updates_skip_ephemeral_keys() {
    let f = fixture();
    let id = sid("t1");
    f.registry.start(&id, false).await.unwrap();

    let mut update = std::collections::BTreeMap::new();
    update.insert("creds".to_string(), json!({"me": "5511"}));
    update.insert("pre-key-1".to_string(), json!("AAAA"));
    update.insert("app-state-sync-key-XYZ".to_string(), json!("BBBB"));
    f.transport
        .emit(&id, TransportEvent::CredentialsUpdated(update))
        .await;
    assert!(settle(|| f.credentials.snapshot("t1").len() == 2).await);

    let stored = f.credentials.snapshot("t1");
    assert!(stored.contains_key("creds"));
    assert!(stored.contains_key("pre-key-1"));
    assert!(!stored.contains_key("app-state-sync-key-XYZ"));

    // a null value removes the key
    let mut removal = std::collections::BTreeMap::new();
    removal.insert("pre-key-1".to_string(), serde_json::Value::Null);
    f.transport
        .emit(&id, TransportEvent::CredentialsUpdated(removal))
        .await;
    assert!(settle(|| f.credentials.snapshot("t1").len() == 1).await);
}

#[tokio::test(start_paused = true)]
async fn stored_credentials_are_used_on_connect() {
    let f = fixture();
    f.credentials.seed("t1", "creds", json!({"me": "5511"}));
    f.registry.start(&sid("t1"), false).await.unwrap();
    let creds = f.transport.last_credentials(&sid("t1")).unwrap();
    assert_eq!(creds.get("creds"), Some(&json!({"me": "5511"})));
}

#[tokio::test(start_paused = true)]
async fn remote_logout_purges_and_forgets_the_session() {
    let f = fixture();
    let id = sid("t1");
    f.credentials.seed("t1", "creds", json!({}));
    connected(&f, &id).await;

    f.transport
        .emit(&id, TransportEvent::Closed(CloseReason::LoggedOut))
        .await;
    assert!(settle(|| f.registry.get_status(&id).is_none()).await);
    assert!(f.credentials.snapshot("t1").is_empty());
    assert_eq!(f.recorder.statuses().last(), Some(&SessionStatus::Disconnected));

    // no reconnect after a logout
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(f.transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn connection_loss_reconnects_after_the_delay() {
    let f = fixture();
    let id = sid("t1");
    connected(&f, &id).await;

    f.transport
        .emit(
            &id,
            TransportEvent::Closed(CloseReason::ConnectionLost("stream errored".into())),
        )
        .await;
    assert!(settle(|| f.registry.get_status(&id) == Some(SessionStatus::Disconnected)).await);
    assert_eq!(f.transport.connect_count(), 1);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(f.transport.connect_count(), 1, "reconnected before the delay");

    assert!(settle(|| f.transport.connect_count() == 2).await);
    assert_eq!(f.registry.get_status(&id), Some(SessionStatus::Connecting));

    f.transport.emit(&id, TransportEvent::Open).await;
    assert!(settle(|| f.registry.get_status(&id) == Some(SessionStatus::Connected)).await);
}

#[tokio::test(start_paused = true)]
async fn failed_connect_is_retried() {
    let f = fixture();
    let id = sid("t1");
    f.transport.fail_next_connects(1);

    let err = f.registry.start(&id, false).await.unwrap_err();
    assert!(matches!(err, AtendenteError::Transport { .. }));
    assert_eq!(f.registry.get_status(&id), Some(SessionStatus::Disconnected));

    assert!(settle(|| f.transport.connect_count() == 2).await);
    assert_eq!(f.registry.get_status(&id), Some(SessionStatus::Connecting));
}

#[tokio::test(start_paused = true)]
async fn disconnect_purges_even_when_logout_fails() {
    let f = fixture();
    let id = sid("t1");
    f.credentials.seed("t1", "creds", json!({}));
    connected(&f, &id).await;
    let handle = f.transport.handle(&id).unwrap();
    handle.fail_logout(true);

    f.registry.disconnect(&id).await.unwrap();
    assert!(handle.is_closed());
    assert!(!handle.is_logged_out());
    assert!(f.credentials.snapshot("t1").is_empty());
    assert_eq!(f.registry.get_status(&id), None);
    assert!(f.registry.list_sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn disconnect_of_unknown_session_still_purges() {
    let f = fixture();
    f.credentials.seed("ghost", "creds", json!({}));
    f.registry.disconnect(&sid("ghost")).await.unwrap();
    assert!(f.credentials.snapshot("ghost").is_empty());
}

#[tokio::test(start_paused = true)]
async fn restore_starts_sessions_with_credentials() {
    let f = fixture();
    f.credentials.seed("a", "creds", json!({}));
    f.credentials.seed("b", "creds", json!({}));

    let restored = f.registry.restore().await.unwrap();
    assert_eq!(restored, 2);
    let ids: Vec<String> = f
        .registry
        .list_sessions()
        .into_iter()
        .map(|s| s.session_id.0)
        .collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn messages_are_routed_onto_the_bus() {
    let f = fixture();
    let id = sid("t1");
    connected(&f, &id).await;

    f.transport
        .emit(
            &id,
            TransportEvent::Messages(vec![
                json!({
                    "key": {"remoteJid": "status@broadcast", "fromMe": false, "id": "S1"},
                    "message": {"conversation": "status"}
                }),
                json!({
                    "key": {"remoteJid": "5511@s.whatsapp.net", "fromMe": false, "id": "M1"},
                    "message": {"conversation": "Oi"}
                }),
            ]),
        )
        .await;
    assert!(settle(|| f.recorder.inbound_texts() == vec!["Oi".to_string()]).await);
}

#[tokio::test(start_paused = true)]
async fn own_sends_are_not_reported_as_manual() {
    let f = fixture();
    let id = sid("t1");
    connected(&f, &id).await;

    let receipt = f.registry.send(&id, "5511@s.whatsapp.net", "auto").await.unwrap();
    let echo_id = receipt.message_id.unwrap();
    f.transport
        .emit(
            &id,
            TransportEvent::Messages(vec![
                json!({
                    "key": {"remoteJid": "5511@s.whatsapp.net", "fromMe": true, "id": echo_id},
                    "message": {"conversation": "auto"}
                }),
                json!({
                    "key": {"remoteJid": "5511@s.whatsapp.net", "fromMe": true, "id": "HUMAN1"},
                    "message": {"conversation": "falando pelo celular"}
                }),
            ]),
        )
        .await;

    assert!(
        settle(|| f
            .recorder
            .kinds()
            .contains(&"manual_outbound_detected"))
        .await
    );
    let manual = f
        .recorder
        .kinds()
        .into_iter()
        .filter(|k| *k == "manual_outbound_detected")
        .count();
    assert_eq!(manual, 1);
}

#[tokio::test(start_paused = true)]
async fn echo_arriving_before_its_receipt_is_not_manual() {
    let f = fixture();
    let id = sid("t1");
    connected(&f, &id).await;
    f.transport.handle(&id).unwrap().echo_sends(true);

    f.registry
        .send(&id, "5511@s.whatsapp.net", "auto")
        .await
        .unwrap();
    assert!(settle(|| f.recorder.kinds().contains(&"message_received")).await);
    assert!(!f.recorder.kinds().contains(&"manual_outbound_detected"));

    f.transport
        .emit(
            &id,
            TransportEvent::Messages(vec![json!({
                "key": {"remoteJid": "5511@s.whatsapp.net", "fromMe": true, "id": "HUMAN1"},
                "message": {"conversation": "falando pelo celular"}
            })]),
        )
        .await;
    assert!(
        settle(|| f
            .recorder
            .kinds()
            .contains(&"manual_outbound_detected"))
        .await
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_without_logout() {
    let f = fixture();
    let id = sid("t1");
    f.credentials.seed("t1", "creds", json!({}));
    connected(&f, &id).await;
    let handle = f.transport.handle(&id).unwrap();

    f.registry.shutdown().await;
    assert!(handle.is_closed());
    assert!(!handle.is_logged_out());
    assert!(!f.credentials.snapshot("t1").is_empty());
    assert!(f.registry.list_sessions().is_empty());
}
