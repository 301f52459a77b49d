// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use imbridge_common::{Chat, ChatService, ChatStyle, PortalId};
use sqlx::SqliteConnection;
use std::collections::BTreeSet;

use crate::codec::{service_from_str, service_to_str, style_from_str, style_to_str};
use crate::error::{StoreError, StoreResult};

/// One chat snapshot to persist, with its portal id resolved or `None` if
/// the Identity Resolver could not yet place it. A record is never
/// dropped for want of resolution.
#[derive(Debug, Clone)]
pub struct ChatUpsert {
    pub chat: Chat,
    pub portal_id: Option<PortalId>,
    pub needs_reconciliation: bool,
}

#[derive(sqlx::FromRow)]
struct ChatRow {
    cloud_chat_id: String,
    record_name: String,
    group_id: Option<String>,
    portal_id: Option<String>,
    style: String,
    service: String,
    display_name: Option<String>,
    participants_json: String,
    updated_ts: DateTime<Utc>,
}

impl ChatRow {
    fn portal(&self) -> Option<PortalId> {
        self.portal_id.as_deref().and_then(|s| s.parse().ok())
    }
}

pub(crate) async fn upsert_chat_one(
    conn: &mut SqliteConnection,
    login_id: &str,
    upsert: &ChatUpsert,
) -> StoreResult<()> {
    let chat = &upsert.chat;
    let participants: BTreeSet<&str> = chat.participants.iter().map(String::as_str).collect();
    let participants_json = serde_json::to_string(&participants)?;
    let portal_str = upsert.portal_id.as_ref().map(PortalId::to_string);
    let group_id_str = chat.group_id.map(|g| g.hyphenated().to_string());
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO chat (
            login_id, cloud_chat_id, record_name, group_id, portal_id, style, service,
            display_name, participants_json, needs_reconciliation, updated_ts, created_ts
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (login_id, cloud_chat_id) DO UPDATE SET
            record_name = excluded.record_name,
            group_id = excluded.group_id,
            portal_id = excluded.portal_id,
            style = excluded.style,
            service = excluded.service,
            display_name = excluded.display_name,
            participants_json = excluded.participants_json,
            needs_reconciliation = excluded.needs_reconciliation,
            updated_ts = excluded.updated_ts
        "#,
    )
    .bind(login_id)
    .bind(&chat.chat_identifier)
    .bind(&chat.record_name)
    .bind(group_id_str)
    .bind(portal_str)
    .bind(style_to_str(chat.style))
    .bind(service_to_str(chat.service))
    .bind(&chat.display_name)
    .bind(participants_json)
    .bind(upsert.needs_reconciliation)
    .bind(chat.updated_timestamp)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn has_chat(
    conn: &mut SqliteConnection,
    login_id: &str,
    cloud_chat_id: &str,
) -> StoreResult<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM chat WHERE login_id = ? AND cloud_chat_id = ?")
            .bind(login_id)
            .bind(cloud_chat_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.is_some())
}

/// Indexed by chat_identifier, record_name or lowercased group_id, in
/// that column order.
pub(crate) async fn find_chat_portal(
    conn: &mut SqliteConnection,
    login_id: &str,
    reference: &str,
) -> StoreResult<Option<PortalId>> {
    let lowered = reference.to_lowercase();
    let row: Option<ChatRow> = sqlx::query_as(
        r#"
        SELECT cloud_chat_id, record_name, group_id, portal_id, style, service,
               display_name, participants_json, updated_ts
        FROM chat
        WHERE login_id = ?
          AND (cloud_chat_id = ? OR record_name = ? OR lower(group_id) = ?)
        LIMIT 1
        "#,
    )
    .bind(login_id)
    .bind(reference)
    .bind(reference)
    .bind(&lowered)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.and_then(|r| r.portal()))
}

pub(crate) async fn find_portals_by_group_id(
    conn: &mut SqliteConnection,
    login_id: &str,
    group_id: uuid::Uuid,
) -> StoreResult<Vec<PortalId>> {
    let rows: Vec<(Option<String>,)> =
        sqlx::query_as("SELECT portal_id FROM chat WHERE login_id = ? AND lower(group_id) = ?")
            .bind(login_id)
            .bind(group_id.hyphenated().to_string())
            .fetch_all(&mut *conn)
            .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(p,)| p)
        .filter_map(|p| p.parse().ok())
        .collect())
}

pub(crate) async fn find_portals_by_participants(
    conn: &mut SqliteConnection,
    login_id: &str,
    participants: &BTreeSet<String>,
) -> StoreResult<Vec<PortalId>> {
    let participants_json = serde_json::to_string(participants)?;
    let rows: Vec<(Option<String>,)> = sqlx::query_as(
        "SELECT portal_id FROM chat WHERE login_id = ? AND participants_json = ?",
    )
    .bind(login_id)
    .bind(participants_json)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(p,)| p)
        .filter_map(|p| p.parse().ok())
        .collect())
}

pub(crate) async fn load_chat(
    conn: &mut SqliteConnection,
    login_id: &str,
    cloud_chat_id: &str,
) -> StoreResult<Option<Chat>> {
    let row: Option<ChatRow> = sqlx::query_as(
        r#"
        SELECT cloud_chat_id, record_name, group_id, portal_id, style, service,
               display_name, participants_json, updated_ts
        FROM chat WHERE login_id = ? AND cloud_chat_id = ?
        "#,
    )
    .bind(login_id)
    .bind(cloud_chat_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(row_to_chat).transpose()
}

fn row_to_chat(row: ChatRow) -> StoreResult<Chat> {
    let participants: BTreeSet<String> = serde_json::from_str(&row.participants_json)?;
    let group_id = row
        .group_id
        .as_deref()
        .map(uuid::Uuid::parse_str)
        .transpose()
        .map_err(|_| StoreError::InvalidPortalId(row.record_name.clone()))?;
    Ok(Chat {
        chat_identifier: row.cloud_chat_id,
        group_id,
        record_name: row.record_name,
        style: style_from_str(&row.style),
        service: service_from_str(&row.service),
        display_name: row.display_name,
        participants,
        updated_timestamp: row.updated_ts,
        original_group_id: None,
    })
}
