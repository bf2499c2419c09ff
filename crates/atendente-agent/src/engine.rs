// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The per-message decision pipeline.
//!
//! For each inbound customer message, in order:
//!
//! 1. Control phrases toggle automation and answer with a fixed text.
//! 2. Paused conversations get nothing, and no provider is called.
//! 3. The first message of a conversation gets the welcome text.
//! 4. Outside business hours the out-of-hours text is sent instead.
//! 5. Audio is transcribed and images described.
//! 6. History, knowledge-base context and FAQ are assembled into a prompt
//!    and the model is called with the tool set.
//! 7. Tool calls run. Data-returning tools get one more model turn, failing
//!    tools answer with a fixed apology.
//!
//! Any error from step 5 on drops the turn silently: the customer never sees
//! an error text and no retry loop can start.

use std::sync::Arc;

use atendente_bus::RoutedMessage;
use atendente_core::traits::AgentProfile;
use atendente_core::types::{
    ContentKind, Conversation, ConversationId, Direction, DomainMessage, Turn, TurnPart, TurnRole,
};
use atendente_core::{AgentSettings, AtendenteError, ConversationStore, MediaAdapter, OutboundSender};
use atendente_knowledge::{Retriever, format_context};
use atendente_llm::LlmClient;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::auto_resume::AutoResumeScheduler;
use crate::texts::{self, ControlCommand};
use crate::tools::{ToolContext, ToolOutcome, ToolRegistry};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// An inbound message that has already been persisted.
#[derive(Debug, Clone)]
pub struct InboundContext {
    pub conversation: Conversation,
    pub message: RoutedMessage,
    /// Id of the stored inbound message, left out of the history window.
    pub persisted_id: String,
}

/// Where a reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Control,
    Welcome,
    OutOfHours,
    Generated,
    /// A tool answered directly, without another model turn.
    ToolText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub kind: ReplyKind,
}

impl Reply {
    fn new(text: impl Into<String>, kind: ReplyKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

pub struct ConversationEngine {
    store: Arc<dyn ConversationStore>,
    settings: Arc<dyn AgentSettings>,
    llm: LlmClient,
    outbound: Arc<dyn OutboundSender>,
    resume: AutoResumeScheduler,
    retriever: Option<Retriever>,
    media: Option<Arc<dyn MediaAdapter>>,
    tools: ToolRegistry,
    history_limit: usize,
    clock: Clock,
}

impl ConversationEngine {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        settings: Arc<dyn AgentSettings>,
        llm: LlmClient,
        outbound: Arc<dyn OutboundSender>,
        resume: AutoResumeScheduler,
    ) -> Self {
        Self {
            store,
            settings,
            llm,
            outbound,
            resume,
            retriever: None,
            media: None,
            tools: ToolRegistry::new(),
            history_limit: 20,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_media(mut self, media: Arc<dyn MediaAdapter>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Replaces the wall clock used for business hours and the prompt date.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn scheduler(&self) -> &AutoResumeScheduler {
        &self.resume
    }

    /// Decides the reply for one inbound message. `None` means stay silent.
    pub async fn handle(&self, ctx: &InboundContext) -> Option<Reply> {
        match self.decide(ctx).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    conversation_id = %ctx.conversation.id,
                    session_id = %ctx.message.session_id,
                    error = %e,
                    "turn dropped, no reply sent"
                );
                metrics::counter!("atendente_responses_suppressed_total").increment(1);
                None
            }
        }
    }

    async fn decide(&self, ctx: &InboundContext) -> Result<Option<Reply>, AtendenteError> {
        let id = &ctx.conversation.id;

        // Typed phrases are honoured even while paused, so "retomar
        // atendimento" can bring the automation back.
        if ctx.message.kind == ContentKind::Text
            && let Some(command) = texts::control_command(&ctx.message.text)
        {
            return self.control(id, command).await.map(Some);
        }

        let conversation = self
            .store
            .get_conversation(id)
            .await?
            .ok_or_else(|| AtendenteError::ConversationNotFound(id.to_string()))?;
        if conversation.paused {
            debug!(conversation_id = %id, "automation paused, ignoring message");
            return Ok(None);
        }

        let profile = self.settings.profile(&conversation.tenant_id).await?;

        if let Some(welcome) = &profile.welcome_message
            && !conversation.welcome_sent
            && self.store.count_messages(id).await? <= 1
            && self.store.mark_welcome_sent(id).await?
        {
            info!(conversation_id = %id, "sending welcome message");
            return Ok(Some(Reply::new(welcome.clone(), ReplyKind::Welcome)));
        }

        let now = (self.clock)();
        if !profile.is_within_business_hours(now)
            && let Some(closed) = &profile.out_of_hours_message
        {
            debug!(conversation_id = %id, "outside business hours");
            return Ok(Some(Reply::new(closed.clone(), ReplyKind::OutOfHours)));
        }

        let Some(user_text) = self.normalize(&ctx.message).await? else {
            debug!(conversation_id = %id, kind = %ctx.message.kind, "nothing to answer");
            return Ok(None);
        };
        if ctx.message.kind != ContentKind::Text
            && let Some(command) = texts::control_command(&user_text)
        {
            return self.control(id, command).await.map(Some);
        }

        self.generate(&conversation, ctx, &profile, &user_text, now)
            .await
    }

    /// Applies a control phrase and returns its canned confirmation.
    async fn control(
        &self,
        id: &ConversationId,
        command: ControlCommand,
    ) -> Result<Reply, AtendenteError> {
        let text = match command {
            ControlCommand::End => {
                self.resume.pause(id).await?;
                texts::END_CONFIRMATION
            }
            ControlCommand::Resume => {
                self.resume.resume(id).await?;
                texts::RESUME_CONFIRMATION
            }
        };
        info!(conversation_id = %id, ?command, "control phrase handled");
        Ok(Reply::new(text, ReplyKind::Control))
    }

    /// Text the model sees for this message. `None` when there is nothing to say.
    async fn normalize(&self, message: &RoutedMessage) -> Result<Option<String>, AtendenteError> {
        let caption = message.text.trim();
        let text = match message.kind {
            ContentKind::Text => caption.to_string(),
            ContentKind::File => {
                if caption.is_empty() {
                    "[arquivo enviado]".to_string()
                } else {
                    format!("[arquivo enviado: {caption}]")
                }
            }
            ContentKind::Audio | ContentKind::Image => {
                let Some(media) = &self.media else {
                    warn!(kind = %message.kind, "no media adapter configured, ignoring media message");
                    return Ok(None);
                };
                let blob = self
                    .outbound
                    .download_media(&message.session_id, &message.raw)
                    .await?;
                if message.kind == ContentKind::Audio {
                    media.transcribe(&blob).await?
                } else {
                    let description = media.describe(&blob).await?;
                    if caption.is_empty() {
                        format!("[imagem: {}]", description.trim())
                    } else {
                        format!("[imagem: {}] {caption}", description.trim())
                    }
                }
            }
        };
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    async fn generate(
        &self,
        conversation: &Conversation,
        ctx: &InboundContext,
        profile: &AgentProfile,
        user_text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Reply>, AtendenteError> {
        let history = self
            .store
            .recent_messages(&conversation.id, self.history_limit.saturating_add(1))
            .await?;
        let mut turns = history_turns(&history, &ctx.persisted_id, self.history_limit);
        push_turn(&mut turns, TurnRole::User, user_text);

        let knowledge = match &self.retriever {
            Some(retriever) => format_context(
                &retriever
                    .search(&conversation.tenant_id, user_text)
                    .await?,
            ),
            None => String::new(),
        };
        let system_prompt = build_system_prompt(profile, conversation, &knowledge, now);

        let definitions = self.tools.definitions();
        let response = self
            .llm
            .generate(&system_prompt, &turns, &definitions)
            .await?;

        if response.tool_calls.is_empty() {
            return Ok(non_empty(response.text, ReplyKind::Generated));
        }

        let tool_ctx = ToolContext {
            tenant_id: conversation.tenant_id.clone(),
            counterpart: conversation.counterpart.clone(),
            display_name: conversation.display_name.clone(),
        };
        let mut call_parts = Vec::new();
        let mut result_parts = Vec::new();
        if !response.text.trim().is_empty() {
            call_parts.push(TurnPart::Text {
                text: response.text.clone(),
            });
        }
        for call in &response.tool_calls {
            let Some(tool) = self.tools.get(&call.name) else {
                warn!(conversation_id = %conversation.id, tool = %call.name, "model called an unknown tool");
                continue;
            };
            debug!(conversation_id = %conversation.id, tool = %call.name, "running tool");
            match tool.invoke(call, &tool_ctx).await {
                ToolOutcome::Final(text) => {
                    return Ok(non_empty(text, ReplyKind::ToolText));
                }
                ToolOutcome::FollowUp(data) => {
                    call_parts.push(TurnPart::ToolCall { call: call.clone() });
                    result_parts.push(TurnPart::ToolResult {
                        name: call.name.clone(),
                        response: data,
                    });
                }
            }
        }

        if result_parts.is_empty() {
            return Ok(non_empty(response.text, ReplyKind::Generated));
        }

        turns.push(Turn {
            role: TurnRole::Model,
            parts: call_parts,
        });
        turns.push(Turn {
            role: TurnRole::User,
            parts: result_parts,
        });
        let follow_up = self.llm.generate(&system_prompt, &turns, &[]).await?;
        Ok(non_empty(follow_up.text, ReplyKind::Generated))
    }
}

fn non_empty(text: String, kind: ReplyKind) -> Option<Reply> {
    let text = text.trim();
    (!text.is_empty()).then(|| Reply::new(text, kind))
}

/// Chronological turns from stored messages, at most `limit` of them.
///
/// Consecutive messages from the same side are merged, and the window never
/// starts with a model turn.
fn history_turns(messages: &[DomainMessage], exclude_id: &str, limit: usize) -> Vec<Turn> {
    let kept: Vec<&DomainMessage> = messages
        .iter()
        .filter(|m| m.id != exclude_id && !m.text.trim().is_empty())
        .collect();
    let skip = kept.len().saturating_sub(limit);

    let mut turns = Vec::new();
    for message in kept.into_iter().skip(skip) {
        let role = match message.direction {
            Direction::Inbound => TurnRole::User,
            Direction::Outbound => TurnRole::Model,
        };
        if turns.is_empty() && role == TurnRole::Model {
            continue;
        }
        push_turn(&mut turns, role, message.text.trim());
    }
    turns
}

/// Appends text, merging into the last turn when it has the same role.
fn push_turn(turns: &mut Vec<Turn>, role: TurnRole, text: &str) {
    if let Some(last) = turns.last_mut()
        && last.role == role
        && let Some(TurnPart::Text { text: previous }) = last.parts.last_mut()
    {
        previous.push('\n');
        previous.push_str(text);
        return;
    }
    turns.push(Turn {
        role,
        parts: vec![TurnPart::Text {
            text: text.to_string(),
        }],
    });
}

fn build_system_prompt(
    profile: &AgentProfile,
    conversation: &Conversation,
    knowledge: &str,
    now: DateTime<Utc>,
) -> String {
    let mut prompt = profile.persona_prompt.trim().to_string();

    prompt.push_str(&format!(
        "\n\nData e hora atuais (UTC): {}.",
        now.format("%Y-%m-%d %H:%M")
    ));
    if let Some(name) = &conversation.display_name {
        prompt.push_str(&format!("\nNome do cliente: {name}."));
    }
    if let Some(faq) = &profile.faq {
        prompt.push_str("\n\n## Perguntas frequentes\n");
        prompt.push_str(faq.trim());
    }
    if !knowledge.is_empty() {
        prompt.push_str("\n\n## Base de conhecimento\n");
        prompt.push_str(knowledge);
    }
    prompt.push_str(
        "\n\nResponda apenas com base nessas informações. \
         Se não souber a resposta, diga que vai verificar com a equipe.",
    );
    prompt
}
