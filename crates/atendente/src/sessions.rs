// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `atendente sessions` command implementation.
//!
//! Reads the database directly, so it works while `serve` is stopped.

use atendente_config::model::AtendenteConfig;
use atendente_core::{AtendenteError, ConversationStore, CredentialStore};
use atendente_storage::SqliteStorage;

/// One stored session with conversation totals.
#[derive(Debug, PartialEq, Eq)]
pub struct StoredSession {
    pub session_id: String,
    pub conversations: usize,
    pub paused: usize,
}

pub async fn collect(storage: &SqliteStorage) -> Result<Vec<StoredSession>, AtendenteError> {
    let mut sessions = Vec::new();
    for session_id in storage.sessions().await? {
        let conversations = storage.list_conversations(&session_id).await?;
        sessions.push(StoredSession {
            paused: conversations.iter().filter(|c| c.paused).count(),
            conversations: conversations.len(),
            session_id,
        });
    }
    Ok(sessions)
}

pub async fn run_sessions(config: &AtendenteConfig) -> Result<(), AtendenteError> {
    let storage = SqliteStorage::open(&config.storage).await?;
    let sessions = collect(&storage).await?;
    if sessions.is_empty() {
        println!("no sessions with stored credentials");
        return Ok(());
    }
    for s in &sessions {
        println!(
            "{}  {} conversations ({} paused)",
            s.session_id, s.conversations, s.paused
        );
    }
    Ok(())
}
