// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD operations.

use atendente_core::types::now_timestamp;
use atendente_core::{AtendenteError, Conversation, ConversationId};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

const COLUMNS: &str =
    "id, tenant_id, counterpart, display_name, paused, welcome_sent, last_activity_at, created_at";

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: ConversationId(row.get(0)?),
        tenant_id: row.get(1)?,
        counterpart: row.get(2)?,
        display_name: row.get(3)?,
        paused: row.get(4)?,
        welcome_sent: row.get(5)?,
        last_activity_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Returns the conversation for `(tenant_id, counterpart)`, inserting it on first contact.
///
/// A known display name fills in a previously empty one.
pub async fn get_or_create(
    db: &Database,
    tenant_id: &str,
    counterpart: &str,
    display_name: Option<&str>,
) -> Result<Conversation, AtendenteError> {
    let tenant_id = tenant_id.to_string();
    let counterpart = counterpart.to_string();
    let display_name = display_name.map(str::to_string);
    let new_id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO conversations (id, tenant_id, counterpart, display_name, last_activity_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT (tenant_id, counterpart) DO UPDATE
                 SET display_name = COALESCE(conversations.display_name, excluded.display_name)",
                params![new_id, tenant_id, counterpart, display_name, now],
            )?;
            let conversation = tx.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM conversations WHERE tenant_id = ?1 AND counterpart = ?2"
                ),
                params![tenant_id, counterpart],
                row_to_conversation,
            )?;
            tx.commit()?;
            Ok(conversation)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(
    db: &Database,
    id: &ConversationId,
) -> Result<Option<Conversation>, AtendenteError> {
    let id = id.0.clone();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Conversations of a tenant, most recently active first.
pub async fn list_for_tenant(
    db: &Database,
    tenant_id: &str,
) -> Result<Vec<Conversation>, AtendenteError> {
    let tenant_id = tenant_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM conversations WHERE tenant_id = ?1
                 ORDER BY last_activity_at DESC"
            ))?;
            let rows = stmt.query_map(params![tenant_id], row_to_conversation)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn set_paused(
    db: &Database,
    id: &ConversationId,
    paused: bool,
) -> Result<(), AtendenteError> {
    let key = id.0.clone();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET paused = ?1 WHERE id = ?2",
                params![paused, key],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        return Err(AtendenteError::ConversationNotFound(id.0.clone()));
    }
    Ok(())
}

/// Sets the welcome marker. Returns false when it was already set.
pub async fn mark_welcome_sent(db: &Database, id: &ConversationId) -> Result<bool, AtendenteError> {
    let id = id.0.clone();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET welcome_sent = 1 WHERE id = ?1 AND welcome_sent = 0",
                params![id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(updated == 1)
}
