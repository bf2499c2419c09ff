// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use atendente_agent::texts;
use atendente_agent::{
    AutoResumeScheduler, ConversationEngine, InboundContext, ReplyKind, ScheduleAppointmentTool,
    SearchKnowledgeTool, ToolRegistry,
};
use atendente_bus::RoutedMessage;
use atendente_config::model::KnowledgeConfig;
use atendente_core::ConversationStore;
use atendente_core::traits::{BusinessHours, OpeningWindow};
use atendente_core::types::{
    ContentKind, Direction, DomainMessage, FinishReason, MediaBlob, Originator, ProviderResponse,
    SessionId, ToolCall, TurnPart, TurnRole,
};
use atendente_knowledge::{Ingestor, KnowledgeStore, Retriever};
use atendente_llm::{LlmClient, RetryPolicy, SAFETY_FALLBACK_TEXT};
use atendente_storage::Database;
use atendente_test_utils::{
    MemoryConversationStore, MockEmbedder, MockMedia, MockProvider, MockReply, MockScheduler,
    MockSender, StaticSettings,
};
use chrono::{NaiveTime, TimeZone, Utc, Weekday};
use proptest::prelude::*;
use serde_json::json;

const TENANT: &str = "padaria-sol";
const CUSTOMER: &str = "5511988887777@s.whatsapp.net";

struct Harness {
    store: Arc<MemoryConversationStore>,
    provider: Arc<MockProvider>,
    settings: Arc<StaticSettings>,
    sender: Arc<MockSender>,
    scheduler: Arc<MockScheduler>,
    engine: ConversationEngine,
}

fn harness_with(
    replies: Vec<MockReply>,
    configure: impl FnOnce(ConversationEngine, &Collaborators) -> ConversationEngine,
) -> Harness {
    let parts = Collaborators {
        store: Arc::new(MemoryConversationStore::new()),
        provider: Arc::new(MockProvider::with_replies(replies)),
        settings: Arc::new(StaticSettings::persona("Você é a assistente da Padaria Sol.")),
        sender: Arc::new(MockSender::new()),
        scheduler: Arc::new(MockScheduler::new()),
    };
    let resume = AutoResumeScheduler::new(parts.store.clone(), Duration::from_secs(600));
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(ScheduleAppointmentTool::new(
        parts.scheduler.clone(),
        60,
    )));
    let engine = ConversationEngine::new(
        parts.store.clone(),
        parts.settings.clone(),
        LlmClient::new(parts.provider.clone(), RetryPolicy::new(3)),
        parts.sender.clone(),
        resume,
    )
    .with_tools(tools);
    let engine = configure(engine, &parts);
    Harness {
        store: parts.store,
        provider: parts.provider,
        settings: parts.settings,
        sender: parts.sender,
        scheduler: parts.scheduler,
        engine,
    }
}

/// Collaborators available while configuring the engine.
struct Collaborators {
    store: Arc<MemoryConversationStore>,
    provider: Arc<MockProvider>,
    settings: Arc<StaticSettings>,
    sender: Arc<MockSender>,
    scheduler: Arc<MockScheduler>,
}

fn harness(replies: Vec<MockReply>) -> Harness {
    harness_with(replies, |engine, _| engine)
}

fn routed(kind: ContentKind, text: &str) -> RoutedMessage {
    RoutedMessage {
        session_id: SessionId(TENANT.into()),
        transport_message_id: None,
        counterpart: CUSTOMER.into(),
        push_name: Some("Ana".into()),
        from_me: false,
        kind,
        text: text.into(),
        raw: json!({"key": {"remoteJid": CUSTOMER}, "message": {}}),
    }
}

/// Persists a customer message the way the service does and returns the engine input.
async fn arrive(h: &Harness, kind: ContentKind, text: &str) -> InboundContext {
    let message = routed(kind, text);
    let conversation = h
        .store
        .get_or_create_conversation(TENANT, CUSTOMER, Some("Ana"))
        .await
        .unwrap();
    let stored = DomainMessage::new(
        conversation.id.clone(),
        Direction::Inbound,
        Originator::Customer,
        kind,
        text,
    );
    h.store.insert_message(&stored).await.unwrap();
    InboundContext {
        conversation,
        message,
        persisted_id: stored.id,
    }
}

async fn is_paused(h: &Harness) -> bool {
    h.store.find(TENANT, CUSTOMER).unwrap().paused
}

fn tool_response(name: &str, args: serde_json::Value) -> MockReply {
    MockReply::Respond(ProviderResponse {
        text: String::new(),
        tool_calls: vec![ToolCall {
            name: name.into(),
            args: args.as_object().cloned().unwrap_or_default(),
        }],
        finish_reason: FinishReason::Stop,
    })
}

#[tokio::test]
async fn first_message_gets_welcome_without_model_call() {
    let h = harness(vec![MockReply::text("Temos pão francês, sim!")]);
    h.settings.update(|p| {
        p.welcome_message = Some("Olá! Bem-vindo à Padaria Sol.".into());
    });

    let ctx = arrive(&h, ContentKind::Text, "oi").await;
    let reply = h.engine.handle(&ctx).await.unwrap();
    assert_eq!(reply.kind, ReplyKind::Welcome);
    assert_eq!(reply.text, "Olá! Bem-vindo à Padaria Sol.");
    assert_eq!(h.provider.call_count(), 0);

    let ctx = arrive(&h, ContentKind::Text, "tem pão francês?").await;
    let reply = h.engine.handle(&ctx).await.unwrap();
    assert_eq!(reply.kind, ReplyKind::Generated);
    assert_eq!(reply.text, "Temos pão francês, sim!");
    assert_eq!(h.provider.call_count(), 1);
}

#[tokio::test]
async fn resume_phrase_unpauses_without_model_call() {
    let h = harness(vec![]);
    let ctx = arrive(&h, ContentKind::Text, "Retomar atendimento").await;
    h.store.set_paused(&ctx.conversation.id, true).await.unwrap();

    let reply = h.engine.handle(&ctx).await.unwrap();
    assert_eq!(reply.kind, ReplyKind::Control);
    assert_eq!(reply.text, texts::RESUME_CONFIRMATION);
    assert!(!is_paused(&h).await);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn end_phrase_pauses_and_arms_resume() {
    let h = harness(vec![]);
    let ctx = arrive(&h, ContentKind::Text, "encerrar atendimento").await;

    let reply = h.engine.handle(&ctx).await.unwrap();
    assert_eq!(reply.text, texts::END_CONFIRMATION);
    assert!(is_paused(&h).await);
    assert!(h.engine.scheduler().is_pending(&ctx.conversation.id));
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn paused_conversation_is_silent() {
    let h = harness(vec![]);
    let ctx = arrive(&h, ContentKind::Text, "alguém aí?").await;
    h.store.set_paused(&ctx.conversation.id, true).await.unwrap();

    assert!(h.engine.handle(&ctx).await.is_none());
    assert_eq!(h.provider.call_count(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn paused_conversations_never_reach_the_provider(
        messages in proptest::collection::vec("\\PC{0,60}", 1..5),
        with_welcome in any::<bool>(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let h = harness(vec![]);
            if with_welcome {
                h.settings.update(|p| p.welcome_message = Some("Olá!".into()));
            }
            let conversation = h
                .store
                .get_or_create_conversation(TENANT, CUSTOMER, None)
                .await
                .unwrap();
            for text in &messages {
                h.store.set_paused(&conversation.id, true).await.unwrap();
                let ctx = arrive(&h, ContentKind::Text, text).await;
                h.engine.handle(&ctx).await;
            }
            assert_eq!(h.provider.call_count(), 0);
        });
    }
}

#[tokio::test]
async fn out_of_hours_message_replaces_generation() {
    let h = harness(vec![]);
    h.settings.update(|p| {
        p.out_of_hours_message = Some("Estamos fechados agora. Abrimos às 7h.".into());
        p.business_hours = Some(BusinessHours {
            utc_offset_minutes: 0,
            windows: Vec::new(),
        });
    });

    let ctx = arrive(&h, ContentKind::Text, "vocês estão abertos?").await;
    let reply = h.engine.handle(&ctx).await.unwrap();
    assert_eq!(reply.kind, ReplyKind::OutOfHours);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn within_hours_generates_normally() {
    // 2026-03-02 is a Monday; 13:00 UTC is 10:00 at UTC-3.
    let monday_morning = Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap();
    let h = harness_with(vec![MockReply::text("Bom dia!")], move |engine, _| {
        engine.with_clock(move || monday_morning)
    });
    h.settings.update(|p| {
        p.out_of_hours_message = Some("Fechado.".into());
        p.business_hours = Some(BusinessHours {
            utc_offset_minutes: -180,
            windows: vec![OpeningWindow {
                weekday: Weekday::Mon,
                open: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            }],
        });
    });

    let ctx = arrive(&h, ContentKind::Text, "bom dia").await;
    assert_eq!(h.engine.handle(&ctx).await.unwrap().text, "Bom dia!");
}

#[tokio::test]
async fn provider_failure_means_silence() {
    let h = harness(vec![MockReply::Status(400)]);
    let ctx = arrive(&h, ContentKind::Text, "qual o preço do bolo?").await;
    assert!(h.engine.handle(&ctx).await.is_none());
    assert_eq!(h.provider.call_count(), 1);
}

#[tokio::test]
async fn safety_filtered_output_uses_fallback() {
    let h = harness(vec![MockReply::Respond(ProviderResponse {
        text: "texto bloqueado".into(),
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Safety,
    })]);
    let ctx = arrive(&h, ContentKind::Text, "oi").await;
    assert_eq!(h.engine.handle(&ctx).await.unwrap().text, SAFETY_FALLBACK_TEXT);
}

#[tokio::test]
async fn history_and_tools_reach_the_provider() {
    let h = harness(vec![MockReply::text("Claro!")]);
    let conversation = h
        .store
        .get_or_create_conversation(TENANT, CUSTOMER, Some("Ana"))
        .await
        .unwrap();
    for (direction, originator, text) in [
        (Direction::Inbound, Originator::Customer, "vocês entregam?"),
        (Direction::Outbound, Originator::Automation, "Entregamos no bairro."),
    ] {
        h.store
            .insert_message(&DomainMessage::new(
                conversation.id.clone(),
                direction,
                originator,
                ContentKind::Text,
                text,
            ))
            .await
            .unwrap();
    }

    let ctx = arrive(&h, ContentKind::Text, "e aos domingos?").await;
    h.engine.handle(&ctx).await.unwrap();

    let request = &h.provider.requests().await[0];
    assert!(request.system_prompt.starts_with("Você é a assistente da Padaria Sol."));
    assert_eq!(request.tools.len(), 1);
    assert_eq!(request.tools[0].name, "schedule_appointment");
    let roles: Vec<TurnRole> = request.turns.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![TurnRole::User, TurnRole::Model, TurnRole::User]);
    assert_eq!(
        request.turns[2].parts,
        vec![TurnPart::Text {
            text: "e aos domingos?".into()
        }]
    );
}

#[tokio::test]
async fn scheduled_appointment_gets_a_confirmation_turn() {
    let h = harness(vec![
        tool_response(
            "schedule_appointment",
            json!({"start": "2026-03-02T14:00:00-03:00", "summary": "Encomenda de bolo"}),
        ),
        MockReply::text("Pronto! Agendei para segunda às 14h."),
    ]);
    let ctx = arrive(&h, ContentKind::Text, "pode marcar segunda às 14h?").await;

    let reply = h.engine.handle(&ctx).await.unwrap();
    assert_eq!(reply.text, "Pronto! Agendei para segunda às 14h.");
    assert_eq!(h.provider.call_count(), 2);
    assert_eq!(h.scheduler.created_events().len(), 1);

    let requests = h.provider.requests().await;
    let follow_up = &requests[1];
    assert!(follow_up.tools.is_empty());
    let n = follow_up.turns.len();
    assert!(matches!(
        &follow_up.turns[n - 2].parts[0],
        TurnPart::ToolCall { call } if call.name == "schedule_appointment"
    ));
    match &follow_up.turns[n - 1].parts[0] {
        TurnPart::ToolResult { name, response } => {
            assert_eq!(name, "schedule_appointment");
            assert_eq!(response["status"], "scheduled");
        }
        other => panic!("unexpected part {other:?}"),
    }
}

#[tokio::test]
async fn failed_appointment_apologizes_without_second_turn() {
    let h = harness(vec![tool_response(
        "schedule_appointment",
        json!({"start": "2026-03-02T14:00:00-03:00"}),
    )]);
    h.scheduler.set_available(false);
    let ctx = arrive(&h, ContentKind::Text, "segunda às 14h").await;

    let reply = h.engine.handle(&ctx).await.unwrap();
    assert_eq!(reply.kind, ReplyKind::ToolText);
    assert_eq!(reply.text, texts::SLOT_UNAVAILABLE);
    assert_eq!(h.provider.call_count(), 1);
}

#[tokio::test]
async fn audio_is_transcribed_before_generation() {
    let media = Arc::new(MockMedia::new("quero encomendar um bolo", "uma foto"));
    let media_for_engine = media.clone();
    let h = harness_with(vec![MockReply::text("Qual sabor?")], move |engine, _| {
        engine.with_media(media_for_engine)
    });
    h.sender.set_media(MediaBlob {
        mime_type: "audio/ogg".into(),
        data: vec![1, 2, 3],
    });

    let ctx = arrive(&h, ContentKind::Audio, "").await;
    assert_eq!(h.engine.handle(&ctx).await.unwrap().text, "Qual sabor?");
    assert_eq!(media.seen()[0].mime_type, "audio/ogg");

    let request = &h.provider.requests().await[0];
    assert_eq!(
        request.turns.last().unwrap().parts,
        vec![TurnPart::Text {
            text: "quero encomendar um bolo".into()
        }]
    );
}

#[tokio::test]
async fn spoken_end_phrase_pauses_without_model_call() {
    let media = Arc::new(MockMedia::new("Encerrar atendimento.", ""));
    let h = harness_with(vec![], move |engine, _| engine.with_media(media));
    h.sender.set_media(MediaBlob {
        mime_type: "audio/ogg".into(),
        data: vec![1, 2, 3],
    });

    let ctx = arrive(&h, ContentKind::Audio, "").await;
    let reply = h.engine.handle(&ctx).await.unwrap();
    assert_eq!(reply.kind, ReplyKind::Control);
    assert_eq!(reply.text, texts::END_CONFIRMATION);
    assert!(is_paused(&h).await);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn image_description_keeps_caption() {
    let media = Arc::new(MockMedia::new("", "um bolo de chocolate"));
    let h = harness_with(vec![], move |engine, _| engine.with_media(media));
    h.sender.set_media(MediaBlob {
        mime_type: "image/jpeg".into(),
        data: vec![0xff],
    });

    let ctx = arrive(&h, ContentKind::Image, "tem desse?").await;
    h.engine.handle(&ctx).await.unwrap();
    let request = &h.provider.requests().await[0];
    assert_eq!(
        request.turns.last().unwrap().parts,
        vec![TurnPart::Text {
            text: "[imagem: um bolo de chocolate] tem desse?".into()
        }]
    );
}

#[tokio::test]
async fn media_failure_means_silence() {
    let media = Arc::new(MockMedia::default());
    media.set_failing(true);
    let h = harness_with(vec![], move |engine, _| engine.with_media(media));
    h.sender.set_media(MediaBlob {
        mime_type: "audio/ogg".into(),
        data: vec![1],
    });

    let ctx = arrive(&h, ContentKind::Audio, "").await;
    assert!(h.engine.handle(&ctx).await.is_none());
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn empty_message_gets_no_reply() {
    let h = harness(vec![]);
    let ctx = arrive(&h, ContentKind::Text, "   ").await;
    assert!(h.engine.handle(&ctx).await.is_none());
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn knowledge_context_is_injected_into_the_prompt() {
    let knowledge = KnowledgeStore::new(Database::open_in_memory().await.unwrap());
    let embedder = Arc::new(MockEmbedder::new());
    let kb = knowledge
        .ensure_knowledge_base(TENANT, "default")
        .await
        .unwrap();
    let doc = knowledge.create_document(&kb.id, "faq").await.unwrap();
    Ingestor::new(knowledge.clone(), embedder.clone(), &KnowledgeConfig::default())
        .ingest(&doc.id, "O bolo de cenoura custa 30 reais.")
        .await
        .unwrap();
    let retriever = Retriever::new(knowledge, embedder, 3);

    let h = harness_with(vec![MockReply::text("Custa 30 reais.")], move |engine, parts| {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(ScheduleAppointmentTool::new(
            parts.scheduler.clone(),
            60,
        )));
        tools.register(Arc::new(SearchKnowledgeTool::new(retriever.clone())));
        engine.with_retriever(retriever).with_tools(tools)
    });
    h.settings.update(|p| p.faq = Some("Aceitamos pix.".into()));

    let ctx = arrive(&h, ContentKind::Text, "quanto custa o bolo de cenoura?").await;
    h.engine.handle(&ctx).await.unwrap();

    let request = &h.provider.requests().await[0];
    assert!(request.system_prompt.contains("O bolo de cenoura custa 30 reais."));
    assert!(request.system_prompt.contains("Aceitamos pix."));
    assert_eq!(request.tools.len(), 2);
    assert_eq!(h.sender.calls().len(), 0);
}
