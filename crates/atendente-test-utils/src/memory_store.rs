// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation and credential stores.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use atendente_core::AtendenteError;
use atendente_core::traits::{ConversationStore, CredentialScope, CredentialStore};
use atendente_core::types::{
    Conversation, ConversationId, CredentialSnapshot, DomainMessage, now_timestamp,
};

#[derive(Default)]
struct ConversationState {
    conversations: Vec<Conversation>,
    messages: Vec<DomainMessage>,
}

#[derive(Default)]
pub struct MemoryConversationStore {
    state: Mutex<ConversationState>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message of a conversation, in insertion order.
    pub fn messages(&self, id: &ConversationId) -> Vec<DomainMessage> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| &m.conversation_id == id)
            .cloned()
            .collect()
    }

    pub fn all_messages(&self) -> Vec<DomainMessage> {
        self.state.lock().unwrap().messages.clone()
    }

    /// Looks a conversation up by counterpart within a tenant.
    pub fn find(&self, tenant_id: &str, counterpart: &str) -> Option<Conversation> {
        self.state
            .lock()
            .unwrap()
            .conversations
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.counterpart == counterpart)
            .cloned()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn get_or_create_conversation(
        &self,
        tenant_id: &str,
        counterpart: &str,
        display_name: Option<&str>,
    ) -> Result<Conversation, AtendenteError> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .conversations
            .iter_mut()
            .find(|c| c.tenant_id == tenant_id && c.counterpart == counterpart)
        {
            if let Some(name) = display_name {
                existing.display_name = Some(name.to_string());
            }
            return Ok(existing.clone());
        }

        let now = now_timestamp();
        let conversation = Conversation {
            id: ConversationId(uuid::Uuid::new_v4().to_string()),
            tenant_id: tenant_id.to_string(),
            counterpart: counterpart.to_string(),
            display_name: display_name.map(str::to_string),
            paused: false,
            welcome_sent: false,
            last_activity_at: now.clone(),
            created_at: now,
        };
        state.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, AtendenteError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .conversations
            .iter()
            .find(|c| &c.id == id)
            .cloned())
    }

    async fn list_conversations(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<Conversation>, AtendenteError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .conversations
            .iter()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn set_paused(&self, id: &ConversationId, paused: bool) -> Result<(), AtendenteError> {
        let mut state = self.state.lock().unwrap();
        let conversation = state
            .conversations
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| AtendenteError::ConversationNotFound(id.to_string()))?;
        conversation.paused = paused;
        Ok(())
    }

    async fn mark_welcome_sent(&self, id: &ConversationId) -> Result<bool, AtendenteError> {
        let mut state = self.state.lock().unwrap();
        let conversation = state
            .conversations
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| AtendenteError::ConversationNotFound(id.to_string()))?;
        let first = !conversation.welcome_sent;
        conversation.welcome_sent = true;
        Ok(first)
    }

    async fn insert_message(&self, message: &DomainMessage) -> Result<(), AtendenteError> {
        let mut state = self.state.lock().unwrap();
        let conversation = state
            .conversations
            .iter_mut()
            .find(|c| c.id == message.conversation_id)
            .ok_or_else(|| AtendenteError::ConversationNotFound(message.conversation_id.to_string()))?;
        conversation.last_activity_at = message.created_at.clone();
        state.messages.push(message.clone());
        Ok(())
    }

    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<DomainMessage>, AtendenteError> {
        let all = self.messages(id);
        let skip = all.len().saturating_sub(limit);
        Ok(all.into_iter().skip(skip).collect())
    }

    async fn count_messages(&self, id: &ConversationId) -> Result<u64, AtendenteError> {
        Ok(self.messages(id).len() as u64)
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    sessions: Mutex<BTreeMap<String, CredentialSnapshot>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current credentials of a session (empty when none).
    pub fn snapshot(&self, session_id: &str) -> CredentialSnapshot {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed(&self, session_id: &str, key: &str, value: serde_json::Value) {
        self.sessions
            .lock()
            .unwrap()
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn read(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, AtendenteError> {
        Ok(self.snapshot(session_id).get(key).cloned())
    }

    async fn write(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), AtendenteError> {
        self.seed(session_id, key, value.clone());
        Ok(())
    }

    async fn delete(
        &self,
        session_id: &str,
        scope: CredentialScope,
    ) -> Result<(), AtendenteError> {
        let mut sessions = self.sessions.lock().unwrap();
        match scope {
            CredentialScope::All => {
                sessions.remove(session_id);
            }
            CredentialScope::Key(key) => {
                if let Some(creds) = sessions.get_mut(session_id) {
                    creds.remove(&key);
                    if creds.is_empty() {
                        sessions.remove(session_id);
                    }
                }
            }
        }
        Ok(())
    }

    async fn load_all(&self, session_id: &str) -> Result<CredentialSnapshot, AtendenteError> {
        Ok(self.snapshot(session_id))
    }

    async fn sessions(&self) -> Result<Vec<String>, AtendenteError> {
        Ok(self.sessions.lock().unwrap().keys().cloned().collect())
    }
}
