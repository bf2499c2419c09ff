// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use atendente_agent::{AutoResumeScheduler, AutomationService, ConversationEngine, OutboundPacer};
use atendente_bus::{BusEvent, EventBus, RoutedMessage};
use atendente_config::model::DeliveryConfig;
use atendente_core::types::{ContentKind, Direction, Originator, SessionId};
use atendente_llm::{LlmClient, RetryPolicy};
use atendente_test_utils::{
    MemoryConversationStore, MockProvider, MockReply, MockSender, StaticSettings,
};
use serde_json::json;

const TENANT: &str = "padaria-sol";
const CUSTOMER: &str = "5511988887777@s.whatsapp.net";
const WINDOW: Duration = Duration::from_secs(600);

struct Fixture {
    bus: EventBus,
    service: Arc<AutomationService>,
    store: Arc<MemoryConversationStore>,
    provider: Arc<MockProvider>,
    sender: Arc<MockSender>,
}

fn fixture(replies: Vec<MockReply>) -> Fixture {
    let store = Arc::new(MemoryConversationStore::new());
    let provider = Arc::new(MockProvider::with_replies(replies));
    let sender = Arc::new(MockSender::new());
    let engine = ConversationEngine::new(
        store.clone(),
        Arc::new(StaticSettings::persona("Você é a assistente da Padaria Sol.")),
        LlmClient::new(provider.clone(), RetryPolicy::new(3)),
        sender.clone(),
        AutoResumeScheduler::new(store.clone(), WINDOW),
    );
    let pacer = OutboundPacer::new(sender.clone(), store.clone(), DeliveryConfig::default());
    let service = Arc::new(AutomationService::new(
        Arc::new(engine),
        pacer,
        store.clone(),
    ));
    let bus = EventBus::new();
    bus.subscribe(service.clone());
    Fixture {
        bus,
        service,
        store,
        provider,
        sender,
    }
}

fn routed(text: &str, from_me: bool, id: &str) -> RoutedMessage {
    RoutedMessage {
        session_id: SessionId(TENANT.into()),
        transport_message_id: Some(id.into()),
        counterpart: CUSTOMER.into(),
        push_name: (!from_me).then(|| "Ana".to_string()),
        from_me,
        kind: ContentKind::Text,
        text: text.into(),
        raw: json!({"key": {"remoteJid": CUSTOMER, "fromMe": from_me, "id": id}}),
    }
}

async fn customer_says(f: &Fixture, text: &str, id: &str) {
    f.bus
        .publish(BusEvent::InboundMessage(routed(text, false, id)))
        .await;
    f.service.wait_idle().await;
}

async fn operator_says(f: &Fixture, text: &str, id: &str) {
    f.bus
        .publish(BusEvent::ManualOutboundDetected(routed(text, true, id)))
        .await;
    f.service.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn inbound_message_is_answered_and_recorded() {
    let f = fixture(vec![MockReply::text("Olá, Ana! Como posso ajudar?")]);
    customer_says(&f, "oi", "IN1").await;

    assert_eq!(f.sender.texts(), vec!["Olá, Ana! Como posso ajudar?"]);

    let conversation = f.store.find(TENANT, CUSTOMER).unwrap();
    assert_eq!(conversation.display_name.as_deref(), Some("Ana"));
    let messages = f.store.messages(&conversation.id);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].direction, Direction::Inbound);
    assert_eq!(messages[0].transport_message_id.as_deref(), Some("IN1"));
    assert!(messages[0].raw.is_some());
    assert_eq!(messages[1].originator, Originator::Automation);
    assert_eq!(messages[1].text, "Olá, Ana! Como posso ajudar?");
}

#[tokio::test(start_paused = true)]
async fn operator_message_pauses_until_window_elapses() {
    let f = fixture(vec![]);
    customer_says(&f, "oi", "IN1").await;
    assert_eq!(f.provider.call_count(), 1);

    operator_says(&f, "Oi Ana, aqui é a Júlia!", "OUT1").await;
    let conversation = f.store.find(TENANT, CUSTOMER).unwrap();
    assert!(conversation.paused);
    let last = f.store.messages(&conversation.id).pop().unwrap();
    assert_eq!(last.originator, Originator::HumanAgent);
    assert_eq!(last.direction, Direction::Outbound);

    customer_says(&f, "obrigada, Júlia", "IN2").await;
    assert_eq!(f.provider.call_count(), 1, "paused conversation reached the model");
    assert_eq!(f.sender.texts().len(), 1);

    tokio::time::sleep(WINDOW + Duration::from_secs(1)).await;
    assert!(!f.store.find(TENANT, CUSTOMER).unwrap().paused);

    customer_says(&f, "e o pão de queijo?", "IN3").await;
    assert_eq!(f.provider.call_count(), 2);
    assert_eq!(f.sender.texts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_generation_sends_nothing() {
    let f = fixture(vec![MockReply::Status(401)]);
    customer_says(&f, "oi", "IN1").await;

    assert!(f.sender.calls().is_empty());
    let conversation = f.store.find(TENANT, CUSTOMER).unwrap();
    assert_eq!(f.store.messages(&conversation.id).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn undeliverable_reply_is_not_recorded() {
    let f = fixture(vec![]);
    f.sender.set_failing(true);
    customer_says(&f, "oi", "IN1").await;

    let conversation = f.store.find(TENANT, CUSTOMER).unwrap();
    let messages = f.store.messages(&conversation.id);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, Direction::Inbound);
}

#[tokio::test(start_paused = true)]
async fn shutdown_ignores_later_messages() {
    let f = fixture(vec![]);
    f.service.shutdown().await;
    f.bus
        .publish(BusEvent::InboundMessage(routed("oi", false, "IN1")))
        .await;
    assert_eq!(f.service.in_flight(), 0);
    assert_eq!(f.provider.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn echo_of_our_reply_does_not_pause() {
    let f = fixture(vec![]);

    // The echo is routed while the reply is still being typed and sent.
    f.bus
        .publish(BusEvent::InboundMessage(routed("oi", false, "IN1")))
        .await;
    f.bus
        .publish(BusEvent::ManualOutboundDetected(routed(
            "resposta automática",
            true,
            "SENT1",
        )))
        .await;
    f.service.wait_idle().await;

    assert_eq!(f.sender.sent_ids(), vec!["SENT1".to_string()]);
    let conversation = f.store.find(TENANT, CUSTOMER).unwrap();
    assert!(!conversation.paused);
    assert!(
        f.store
            .messages(&conversation.id)
            .iter()
            .all(|m| m.originator != Originator::HumanAgent)
    );

    customer_says(&f, "e o pão de queijo?", "IN2").await;
    assert_eq!(f.provider.call_count(), 2);
}
