// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence collaborators: conversations, messages and transport credentials.

use async_trait::async_trait;

use crate::error::AtendenteError;
use crate::types::{Conversation, ConversationId, CredentialSnapshot, DomainMessage};

/// Which credentials a delete applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialScope {
    Key(String),
    All,
}

/// Stores transport authentication material across restarts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn read(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, AtendenteError>;

    async fn write(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), AtendenteError>;

    async fn delete(&self, session_id: &str, scope: CredentialScope)
    -> Result<(), AtendenteError>;

    /// Every stored credential for a session.
    async fn load_all(&self, session_id: &str) -> Result<CredentialSnapshot, AtendenteError>;

    /// Session ids that have at least one stored credential.
    async fn sessions(&self) -> Result<Vec<String>, AtendenteError>;
}

/// Conversation and message persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Returns the conversation for `(tenant_id, counterpart)`, creating it on first contact.
    async fn get_or_create_conversation(
        &self,
        tenant_id: &str,
        counterpart: &str,
        display_name: Option<&str>,
    ) -> Result<Conversation, AtendenteError>;

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, AtendenteError>;

    async fn list_conversations(&self, tenant_id: &str)
    -> Result<Vec<Conversation>, AtendenteError>;

    async fn set_paused(&self, id: &ConversationId, paused: bool) -> Result<(), AtendenteError>;

    /// Records that the welcome text went out. Returns false if it already had.
    async fn mark_welcome_sent(&self, id: &ConversationId) -> Result<bool, AtendenteError>;

    /// Persists a message and bumps the conversation's last activity.
    async fn insert_message(&self, message: &DomainMessage) -> Result<(), AtendenteError>;

    /// The most recent `limit` messages, oldest first.
    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<DomainMessage>, AtendenteError>;

    async fn count_messages(&self, id: &ConversationId) -> Result<u64, AtendenteError>;
}
