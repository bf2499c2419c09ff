// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bus subscriber that connects routed messages to the engine and the pacer.
//!
//! Each routed message is handled on its own task so that typing delays
//! never hold up the transport's event pump. Messages of the same
//! conversation are serialized behind a per-conversation lock.

use std::sync::Arc;

use async_trait::async_trait;
use atendente_bus::{BusEvent, EventBus, EventSubscriber, RoutedMessage};
use atendente_core::types::{Direction, DomainMessage, Originator};
use atendente_core::{AtendenteError, ConversationStore};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::engine::{ConversationEngine, InboundContext};
use crate::pacer::OutboundPacer;

type LockMap = DashMap<String, Arc<Mutex<()>>>;

pub struct AutomationService {
    engine: Arc<ConversationEngine>,
    pacer: OutboundPacer,
    store: Arc<dyn ConversationStore>,
    tracker: TaskTracker,
    locks: Arc<LockMap>,
}

impl AutomationService {
    pub fn new(
        engine: Arc<ConversationEngine>,
        pacer: OutboundPacer,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            engine,
            pacer,
            store,
            tracker: TaskTracker::new(),
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Number of messages still being handled.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every message received so far has been handled.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Stops accepting work, waits for in-flight turns and aborts resume timers.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.engine.scheduler().shutdown();
        info!("automation service stopped");
    }

    fn spawn(&self, message: RoutedMessage, manual: bool) {
        if self.tracker.is_closed() {
            debug!(session_id = %message.session_id, "shutting down, message ignored");
            return;
        }
        let worker = Worker {
            engine: self.engine.clone(),
            pacer: self.pacer.clone(),
            store: self.store.clone(),
            locks: self.locks.clone(),
        };
        self.tracker.spawn(async move {
            worker.run(message, manual).await;
        });
    }
}

#[async_trait]
impl EventSubscriber for AutomationService {
    fn name(&self) -> &str {
        "automation"
    }

    async fn on_event(&self, _bus: &EventBus, event: &BusEvent) {
        match event {
            BusEvent::InboundMessage(message) => self.spawn(message.clone(), false),
            BusEvent::ManualOutboundDetected(message) => self.spawn(message.clone(), true),
            _ => {}
        }
    }
}

struct Worker {
    engine: Arc<ConversationEngine>,
    pacer: OutboundPacer,
    store: Arc<dyn ConversationStore>,
    locks: Arc<LockMap>,
}

impl Worker {
    async fn run(self, message: RoutedMessage, manual: bool) {
        let key = format!("{}\u{1f}{}", message.session_id, message.counterpart);
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let guard = lock.lock().await;

        let result = if manual {
            self.manual_outbound(&message).await
        } else {
            self.inbound(&message).await
        };
        if let Err(e) = result {
            error!(
                session_id = %message.session_id,
                counterpart = %message.counterpart,
                manual,
                error = %e,
                "failed to handle routed message"
            );
        }

        drop(guard);
        drop(lock);
        self.locks.remove_if(&key, |_, l| Arc::strong_count(l) == 1);
    }

    async fn inbound(&self, message: &RoutedMessage) -> Result<(), AtendenteError> {
        let conversation = self
            .store
            .get_or_create_conversation(
                message.session_id.as_str(),
                &message.counterpart,
                message.push_name.as_deref(),
            )
            .await?;
        let stored = persist(
            self.store.as_ref(),
            &conversation.id,
            message,
            Direction::Inbound,
            Originator::Customer,
        )
        .await?;

        let ctx = InboundContext {
            conversation,
            message: message.clone(),
            persisted_id: stored.id,
        };
        let Some(reply) = self.engine.handle(&ctx).await else {
            return Ok(());
        };
        debug!(conversation_id = %ctx.conversation.id, kind = ?reply.kind, "delivering reply");

        if let Err(e) = self
            .pacer
            .deliver(
                &message.session_id,
                &ctx.conversation.id,
                &message.counterpart,
                &reply.text,
            )
            .await
        {
            warn!(conversation_id = %ctx.conversation.id, error = %e, "reply not delivered");
        }
        Ok(())
    }

    /// A human operator wrote from the tenant's own account: record it and
    /// hand the conversation over.
    ///
    /// The router can miss the echo of a reply that was still being sent.
    /// By the time this runs the reply holds no conversation lock and its id
    /// is known, so the echo is recognised here.
    async fn manual_outbound(&self, message: &RoutedMessage) -> Result<(), AtendenteError> {
        if let Some(id) = &message.transport_message_id
            && self.pacer.sent_by_automation(id)
        {
            debug!(
                session_id = %message.session_id,
                message_id = %id,
                "own reply echoed back, not an operator send"
            );
            return Ok(());
        }
        let conversation = self
            .store
            .get_or_create_conversation(message.session_id.as_str(), &message.counterpart, None)
            .await?;
        persist(
            self.store.as_ref(),
            &conversation.id,
            message,
            Direction::Outbound,
            Originator::HumanAgent,
        )
        .await?;

        if !conversation.paused {
            self.engine.scheduler().pause(&conversation.id).await?;
            info!(
                conversation_id = %conversation.id,
                window_secs = self.engine.scheduler().window().as_secs(),
                "human operator took over, automation paused"
            );
        }
        Ok(())
    }
}

async fn persist(
    store: &dyn ConversationStore,
    conversation_id: &atendente_core::ConversationId,
    message: &RoutedMessage,
    direction: Direction,
    originator: Originator,
) -> Result<DomainMessage, AtendenteError> {
    let mut stored = DomainMessage::new(
        conversation_id.clone(),
        direction,
        originator,
        message.kind,
        message.text.clone(),
    );
    stored.raw = Some(message.raw.clone());
    stored.transport_message_id = message.transport_message_id.clone();
    store.insert_message(&stored).await?;
    Ok(stored)
}
