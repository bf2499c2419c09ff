// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence. Insertion order (`seq`) is the conversation order.

use atendente_core::{AtendenteError, ConversationId, DomainMessage};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::parse_column;

/// Insert a message and bump the conversation's last activity.
pub async fn insert_message(db: &Database, msg: &DomainMessage) -> Result<(), AtendenteError> {
    let msg = msg.clone();
    let raw = match &msg.raw {
        Some(value) => Some(serde_json::to_string(value).map_err(|e| AtendenteError::Storage {
            source: Box::new(e),
        })?),
        None => None,
    };

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (id, conversation_id, direction, originator, kind, text, raw, transport_message_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    msg.id,
                    msg.conversation_id.0,
                    msg.direction.to_string(),
                    msg.originator.to_string(),
                    msg.kind.to_string(),
                    msg.text,
                    raw,
                    msg.transport_message_id,
                    msg.created_at,
                ],
            )?;
            tx.execute(
                "UPDATE conversations SET last_activity_at = ?1 WHERE id = ?2",
                params![msg.created_at, msg.conversation_id.0],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The newest `limit` messages of a conversation, returned oldest first.
pub async fn recent_messages(
    db: &Database,
    conversation_id: &ConversationId,
    limit: usize,
) -> Result<Vec<DomainMessage>, AtendenteError> {
    let conversation_id = conversation_id.0.clone();
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, direction, originator, kind, text, raw, transport_message_id, created_at
                 FROM (
                     SELECT * FROM messages WHERE conversation_id = ?1
                     ORDER BY seq DESC LIMIT ?2
                 )
                 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id, limit], |row| {
                let raw: Option<String> = row.get(6)?;
                Ok(DomainMessage {
                    id: row.get(0)?,
                    conversation_id: ConversationId(row.get(1)?),
                    direction: parse_column(row, 2)?,
                    originator: parse_column(row, 3)?,
                    kind: parse_column(row, 4)?,
                    text: row.get(5)?,
                    raw: raw.and_then(|r| serde_json::from_str(&r).ok()),
                    transport_message_id: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_messages(
    db: &Database,
    conversation_id: &ConversationId,
) -> Result<u64, AtendenteError> {
    let conversation_id = conversation_id.0.clone();
    let count: i64 = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(count.max(0) as u64)
}
