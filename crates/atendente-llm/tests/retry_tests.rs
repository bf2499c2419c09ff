// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry behavior of the LLM client against scripted provider failures.

use std::sync::Arc;
use std::time::Duration;

use atendente_core::AtendenteError;
use atendente_core::types::{FinishReason, ProviderResponse, Turn, TurnPart, TurnRole};
use atendente_llm::{LlmClient, RetryPolicy, SAFETY_FALLBACK_TEXT};
use atendente_test_utils::{MockProvider, MockReply};
use tokio::time::Instant;

fn client(provider: &Arc<MockProvider>, attempts: u32) -> LlmClient {
    LlmClient::new(provider.clone(), RetryPolicy::new(attempts))
}

#[tokio::test(start_paused = true)]
async fn two_rate_limits_then_success() {
    let provider = Arc::new(MockProvider::with_replies(vec![
        MockReply::Status(429),
        MockReply::Status(429),
        MockReply::text("Olá! Como posso ajudar?"),
    ]));
    let llm = client(&provider, 3);

    let started = Instant::now();
    let response = llm.generate("sys", &[Turn::user("oi")], &[]).await.unwrap();

    assert_eq!(response.text, "Olá! Como posso ajudar?");
    assert_eq!(provider.call_count(), 3);
    // 1000 ms after the first failure, 2000 ms after the second
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(3000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(3100), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_the_last_error() {
    let provider = Arc::new(MockProvider::with_replies(vec![
        MockReply::Status(503),
        MockReply::Status(503),
        MockReply::Status(503),
        MockReply::text("never reached"),
    ]));
    let llm = client(&provider, 3);

    let err = llm.generate("sys", &[], &[]).await.unwrap_err();
    assert!(matches!(
        err,
        AtendenteError::Provider {
            status: Some(503),
            ..
        }
    ));
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn terminal_errors_are_not_retried() {
    let provider = Arc::new(MockProvider::with_replies(vec![
        MockReply::Status(401),
        MockReply::text("never reached"),
    ]));
    let llm = client(&provider, 3);

    let started = Instant::now();
    assert!(llm.generate("sys", &[], &[]).await.is_err());
    assert_eq!(provider.call_count(), 1);
    assert!(started.elapsed() < Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn connection_failures_are_retried() {
    let provider = Arc::new(MockProvider::with_replies(vec![
        MockReply::Unreachable,
        MockReply::text("ok"),
    ]));
    let llm = client(&provider, 3);
    assert_eq!(llm.generate("sys", &[], &[]).await.unwrap().text, "ok");
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn single_attempt_policy_never_sleeps() {
    let provider = Arc::new(MockProvider::with_replies(vec![MockReply::Status(429)]));
    let llm = client(&provider, 1);
    let started = Instant::now();
    assert!(llm.generate("sys", &[], &[]).await.is_err());
    assert_eq!(provider.call_count(), 1);
    assert!(started.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn safety_finish_reason_yields_fallback() {
    let provider = Arc::new(MockProvider::with_replies(vec![MockReply::Respond(
        ProviderResponse {
            text: "raw provider text".into(),
            tool_calls: vec![],
            finish_reason: FinishReason::Safety,
        },
    )]));
    let llm = client(&provider, 3);
    let response = llm.generate("sys", &[], &[]).await.unwrap();
    assert_eq!(response.text, SAFETY_FALLBACK_TEXT);
}

#[tokio::test]
async fn chat_appends_the_user_turn_without_tools() {
    let provider = Arc::new(MockProvider::with_replies(vec![MockReply::text("resposta")]));
    let llm = client(&provider, 3);

    let history = vec![Turn::user("primeira"), Turn::model("ok")];
    let text = llm.chat("persona", "segunda", &history).await.unwrap();
    assert_eq!(text, "resposta");

    let requests = provider.requests().await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.system_prompt, "persona");
    assert!(request.tools.is_empty());
    assert_eq!(request.turns.len(), 3);
    let last = request.turns.last().unwrap();
    assert_eq!(last.role, TurnRole::User);
    assert_eq!(
        last.parts,
        vec![TurnPart::Text {
            text: "segunda".into()
        }]
    );
}
