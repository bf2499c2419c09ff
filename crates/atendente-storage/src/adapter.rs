// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the conversation and credential stores.

use async_trait::async_trait;
use tracing::debug;

use atendente_config::model::StorageConfig;
use atendente_core::traits::storage::CredentialScope;
use atendente_core::types::CredentialSnapshot;
use atendente_core::{
    AtendenteError, Conversation, ConversationId, ConversationStore, CredentialStore,
    DomainMessage,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage, cheap to clone.
#[derive(Clone)]
pub struct SqliteStorage {
    db: Database,
}

impl SqliteStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Opens the database described by the storage config.
    pub async fn open(config: &StorageConfig) -> Result<Self, AtendenteError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        Ok(Self { db })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl ConversationStore for SqliteStorage {
    async fn get_or_create_conversation(
        &self,
        tenant_id: &str,
        counterpart: &str,
        display_name: Option<&str>,
    ) -> Result<Conversation, AtendenteError> {
        queries::conversations::get_or_create(&self.db, tenant_id, counterpart, display_name).await
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, AtendenteError> {
        queries::conversations::get(&self.db, id).await
    }

    async fn list_conversations(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<Conversation>, AtendenteError> {
        queries::conversations::list_for_tenant(&self.db, tenant_id).await
    }

    async fn set_paused(&self, id: &ConversationId, paused: bool) -> Result<(), AtendenteError> {
        debug!(conversation_id = %id, paused, "updating paused flag");
        queries::conversations::set_paused(&self.db, id, paused).await
    }

    async fn mark_welcome_sent(&self, id: &ConversationId) -> Result<bool, AtendenteError> {
        queries::conversations::mark_welcome_sent(&self.db, id).await
    }

    async fn insert_message(&self, message: &DomainMessage) -> Result<(), AtendenteError> {
        queries::messages::insert_message(&self.db, message).await
    }

    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<DomainMessage>, AtendenteError> {
        queries::messages::recent_messages(&self.db, id, limit).await
    }

    async fn count_messages(&self, id: &ConversationId) -> Result<u64, AtendenteError> {
        queries::messages::count_messages(&self.db, id).await
    }
}

#[async_trait]
impl CredentialStore for SqliteStorage {
    async fn read(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, AtendenteError> {
        queries::credentials::read(&self.db, session_id, key).await
    }

    async fn write(
        &self,
        session_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), AtendenteError> {
        queries::credentials::write(&self.db, session_id, key, value).await
    }

    async fn delete(
        &self,
        session_id: &str,
        scope: CredentialScope,
    ) -> Result<(), AtendenteError> {
        match scope {
            CredentialScope::Key(key) => {
                queries::credentials::delete_key(&self.db, session_id, &key).await
            }
            CredentialScope::All => {
                let removed = queries::credentials::delete_all(&self.db, session_id).await?;
                debug!(session_id, removed, "purged credentials");
                Ok(())
            }
        }
    }

    async fn load_all(&self, session_id: &str) -> Result<CredentialSnapshot, AtendenteError> {
        queries::credentials::load_all(&self.db, session_id).await
    }

    async fn sessions(&self) -> Result<Vec<String>, AtendenteError> {
        queries::credentials::sessions(&self.db).await
    }
}
