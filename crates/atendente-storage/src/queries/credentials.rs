// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport credential key/value storage, one namespace per session.

use atendente_core::types::{CredentialSnapshot, now_timestamp};
use atendente_core::AtendenteError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

fn decode(raw: &str) -> Result<serde_json::Value, AtendenteError> {
    serde_json::from_str(raw).map_err(|e| AtendenteError::Storage {
        source: Box::new(e),
    })
}

pub async fn read(
    db: &Database,
    session_id: &str,
    key: &str,
) -> Result<Option<serde_json::Value>, AtendenteError> {
    let session_id = session_id.to_string();
    let key = key.to_string();
    let raw: Option<String> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT value FROM credentials WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    raw.as_deref().map(decode).transpose()
}

/// Insert or replace one credential.
pub async fn write(
    db: &Database,
    session_id: &str,
    key: &str,
    value: &serde_json::Value,
) -> Result<(), AtendenteError> {
    let session_id = session_id.to_string();
    let key = key.to_string();
    let value = serde_json::to_string(value).map_err(|e| AtendenteError::Storage {
        source: Box::new(e),
    })?;
    let now = now_timestamp();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO credentials (session_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (session_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![session_id, key, value, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_key(db: &Database, session_id: &str, key: &str) -> Result<(), AtendenteError> {
    let session_id = session_id.to_string();
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM credentials WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Remove every credential of a session. Returns the number of rows removed.
pub async fn delete_all(db: &Database, session_id: &str) -> Result<usize, AtendenteError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM credentials WHERE session_id = ?1",
                params![session_id],
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn load_all(db: &Database, session_id: &str) -> Result<CredentialSnapshot, AtendenteError> {
    let session_id = session_id.to_string();
    let rows: Vec<(String, String)> = db
        .connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT key, value FROM credentials WHERE session_id = ?1")?;
            let rows = stmt.query_map(params![session_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)?;

    rows.into_iter()
        .map(|(key, raw)| Ok((key, decode(&raw)?)))
        .collect()
}

/// Distinct session ids with stored credentials.
pub async fn sessions(db: &Database) -> Result<Vec<String>, AtendenteError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT session_id FROM credentials ORDER BY session_id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
