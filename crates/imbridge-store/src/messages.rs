// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::Utc;
use imbridge_common::{AttachmentMeta, EditDescriptor, Message, PortalId, TapbackDescriptor};
use sqlx::SqliteConnection;

use crate::codec::{service_from_str, service_to_str, tapback_from_str, tapback_to_str};
use crate::error::StoreResult;

#[derive(sqlx::FromRow)]
struct MessageRow {
    guid: String,
    record_name: Option<String>,
    portal_id: Option<String>,
    timestamp_ms: i64,
    sender: Option<String>,
    is_from_me: bool,
    text: Option<String>,
    subject: Option<String>,
    service: String,
    deleted: bool,
    tapback_type: Option<String>,
    tapback_target_guid: Option<String>,
    tapback_emoji: Option<String>,
    tapback_remove: Option<bool>,
    edit_target_guid: Option<String>,
    edit_new_text: Option<String>,
    attachments_json: String,
}

impl MessageRow {
    fn into_message(self) -> StoreResult<Message> {
        let attachments: Vec<AttachmentMeta> = serde_json::from_str(&self.attachments_json)?;
        let tapback = self.tapback_type.map(|t| TapbackDescriptor {
            target_guid: self.tapback_target_guid.unwrap_or_default(),
            tapback_type: tapback_from_str(&t),
            emoji: self.tapback_emoji,
            remove: self.tapback_remove.unwrap_or(false),
        });
        let edit = self.edit_target_guid.map(|target_guid| EditDescriptor {
            target_guid,
            new_text: self.edit_new_text.unwrap_or_default(),
        });
        Ok(Message {
            guid: self.guid,
            record_name: self.record_name,
            portal_id: self.portal_id.and_then(|p| p.parse().ok()),
            timestamp_ms: self.timestamp_ms,
            sender: self.sender,
            is_from_me: self.is_from_me,
            text: self.text,
            subject: self.subject,
            service: service_from_str(&self.service),
            deleted: self.deleted,
            tapback,
            edit,
            attachments,
        })
    }
}

/// One message to persist, alongside the chat it was attached to (for the
/// `(chat_id, timestamp_ms, guid)` index) and its resolved portal, if any.
#[derive(Debug, Clone)]
pub struct MessageUpsert {
    pub message: Message,
    pub chat_id: Option<String>,
}

/// Upserts one message row. Preserves `deleted = true` once set: an upsert
/// that arrives with `deleted = false` never un-deletes a previously
/// tombstoned row.
pub(crate) async fn upsert_message_one(
    conn: &mut SqliteConnection,
    login_id: &str,
    upsert: &MessageUpsert,
) -> StoreResult<()> {
    let m = &upsert.message;
    let attachments_json = serde_json::to_string(&m.attachments)?;
    let portal_str = m.portal_id.as_ref().map(PortalId::to_string);
    let (tapback_type, tapback_target, tapback_emoji, tapback_remove) = match &m.tapback {
        Some(t) => (
            Some(tapback_to_str(t.tapback_type)),
            Some(t.target_guid.clone()),
            t.emoji.clone(),
            Some(t.remove),
        ),
        None => (None, None, None, None),
    };
    let (edit_target, edit_text) = match &m.edit {
        Some(e) => (Some(e.target_guid.clone()), Some(e.new_text.clone())),
        None => (None, None),
    };
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO message (
            login_id, guid, chat_id, record_name, portal_id, timestamp_ms, sender,
            is_from_me, text, subject, service, deleted,
            tapback_type, tapback_target_guid, tapback_emoji, tapback_remove,
            edit_target_guid, edit_new_text, attachments_json, created_ts, updated_ts
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (login_id, guid) DO UPDATE SET
            chat_id = excluded.chat_id,
            record_name = excluded.record_name,
            portal_id = excluded.portal_id,
            timestamp_ms = excluded.timestamp_ms,
            sender = excluded.sender,
            is_from_me = excluded.is_from_me,
            text = excluded.text,
            subject = excluded.subject,
            service = excluded.service,
            deleted = (deleted = 1 OR excluded.deleted = 1),
            tapback_type = excluded.tapback_type,
            tapback_target_guid = excluded.tapback_target_guid,
            tapback_emoji = excluded.tapback_emoji,
            tapback_remove = excluded.tapback_remove,
            edit_target_guid = excluded.edit_target_guid,
            edit_new_text = excluded.edit_new_text,
            attachments_json = excluded.attachments_json,
            updated_ts = excluded.updated_ts
        "#,
    )
    .bind(login_id)
    .bind(&m.guid)
    .bind(&upsert.chat_id)
    .bind(&m.record_name)
    .bind(portal_str)
    .bind(m.timestamp_ms)
    .bind(m.sender.clone())
    .bind(m.is_from_me)
    .bind(m.text.clone())
    .bind(m.subject.clone())
    .bind(service_to_str(m.service))
    .bind(m.deleted)
    .bind(tapback_type)
    .bind(tapback_target)
    .bind(tapback_emoji)
    .bind(tapback_remove)
    .bind(edit_target)
    .bind(edit_text)
    .bind(attachments_json)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Looks up the portal a previously-persisted message belongs to. Used by
/// the dispatcher to route guid-only events (unsend, receipts, edits)
/// that carry no chat reference of their own.
pub(crate) async fn find_portal_by_guid(
    conn: &mut SqliteConnection,
    login_id: &str,
    guid: &str,
) -> StoreResult<Option<PortalId>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT portal_id FROM message WHERE login_id = ? AND guid = ?")
            .bind(login_id)
            .bind(guid)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(row.and_then(|(p,)| p).and_then(|p| p.parse().ok()))
}

/// Echo-detection query: true iff any prior upsert persisted this guid,
/// irrespective of its current `deleted` flag.
pub(crate) async fn has_message(
    conn: &mut SqliteConnection,
    login_id: &str,
    guid: &str,
) -> StoreResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM message WHERE login_id = ? AND guid = ?")
        .bind(login_id)
        .bind(guid)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

const MESSAGE_COLUMNS: &str = r#"
    guid, record_name, portal_id, timestamp_ms, sender, is_from_me, text, subject, service,
    deleted, tapback_type, tapback_target_guid, tapback_emoji, tapback_remove,
    edit_target_guid, edit_new_text, attachments_json
"#;

/// Backward backfill: strictly earlier than the anchor, newest-first,
/// paginated by `(timestamp_ms DESC, guid DESC)`.
pub(crate) async fn list_backward_messages(
    conn: &mut SqliteConnection,
    login_id: &str,
    portal: &PortalId,
    before: Option<(i64, &str)>,
    count: usize,
) -> StoreResult<Vec<Message>> {
    let portal_str = portal.to_string();
    let rows: Vec<MessageRow> = match before {
        Some((ts, guid)) => {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM message \
                 WHERE login_id = ? AND portal_id = ? AND deleted = 0 \
                 AND (timestamp_ms < ? OR (timestamp_ms = ? AND guid < ?)) \
                 ORDER BY timestamp_ms DESC, guid DESC LIMIT ?"
            );
            sqlx::query_as(&sql)
                .bind(login_id)
                .bind(&portal_str)
                .bind(ts)
                .bind(ts)
                .bind(guid)
                .bind(count as i64)
                .fetch_all(&mut *conn)
                .await?
        }
        None => {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM message \
                 WHERE login_id = ? AND portal_id = ? AND deleted = 0 \
                 ORDER BY timestamp_ms DESC, guid DESC LIMIT ?"
            );
            sqlx::query_as(&sql)
                .bind(login_id)
                .bind(&portal_str)
                .bind(count as i64)
                .fetch_all(&mut *conn)
                .await?
        }
    };
    rows.into_iter().map(MessageRow::into_message).collect()
}

/// Forward backfill: strictly later than the anchor, oldest-first. Callers
/// chunk internally; this returns one chunk.
pub(crate) async fn list_forward_messages(
    conn: &mut SqliteConnection,
    login_id: &str,
    portal: &PortalId,
    after: Option<(i64, &str)>,
    count: usize,
) -> StoreResult<Vec<Message>> {
    let portal_str = portal.to_string();
    let rows: Vec<MessageRow> = match after {
        Some((ts, guid)) => {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM message \
                 WHERE login_id = ? AND portal_id = ? AND deleted = 0 \
                 AND (timestamp_ms > ? OR (timestamp_ms = ? AND guid > ?)) \
                 ORDER BY timestamp_ms ASC, guid ASC LIMIT ?"
            );
            sqlx::query_as(&sql)
                .bind(login_id)
                .bind(&portal_str)
                .bind(ts)
                .bind(ts)
                .bind(guid)
                .bind(count as i64)
                .fetch_all(&mut *conn)
                .await?
        }
        None => {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM message \
                 WHERE login_id = ? AND portal_id = ? AND deleted = 0 \
                 ORDER BY timestamp_ms ASC, guid ASC LIMIT ?"
            );
            sqlx::query_as(&sql)
                .bind(login_id)
                .bind(&portal_str)
                .bind(count as i64)
                .fetch_all(&mut *conn)
                .await?
        }
    };
    rows.into_iter().map(MessageRow::into_message).collect()
}

/// Purges soft-deleted rows whose chat no longer exists, only ever called
/// after a cloud chat deletion has been observed.
pub(crate) async fn prune_tombstoned_messages(
    conn: &mut SqliteConnection,
    login_id: &str,
) -> StoreResult<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM message
        WHERE login_id = ? AND deleted = 1
          AND chat_id IS NOT NULL
          AND chat_id NOT IN (SELECT cloud_chat_id FROM chat WHERE login_id = ?)
        "#,
    )
    .bind(login_id)
    .bind(login_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// Purges all messages for a portal whose tombstone was just cleared:
/// used by the dispatcher when a fresh portal replaces a deleted one.
pub(crate) async fn purge_messages_for_portal(
    conn: &mut SqliteConnection,
    login_id: &str,
    portal: &PortalId,
) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM message WHERE login_id = ? AND portal_id = ?")
        .bind(login_id)
        .bind(portal.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}
