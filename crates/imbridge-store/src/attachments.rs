// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::StoreResult;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttachmentCacheEntry {
    pub record_name: String,
    pub local_path: String,
    pub content_type: String,
}

pub(crate) async fn cache_attachment(
    conn: &mut SqliteConnection,
    login_id: &str,
    entry: &AttachmentCacheEntry,
) -> StoreResult<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO attachment_cache (login_id, record_name, local_path, content_type, created_ts)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (login_id, record_name) DO UPDATE SET
            local_path = excluded.local_path,
            content_type = excluded.content_type
        "#,
    )
    .bind(login_id)
    .bind(&entry.record_name)
    .bind(&entry.local_path)
    .bind(&entry.content_type)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn lookup_attachment(
    conn: &mut SqliteConnection,
    login_id: &str,
    record_name: &str,
) -> StoreResult<Option<AttachmentCacheEntry>> {
    let row = sqlx::query_as(
        "SELECT record_name, local_path, content_type FROM attachment_cache \
         WHERE login_id = ? AND record_name = ?",
    )
    .bind(login_id)
    .bind(record_name)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Prunes cache entries whose `record_name` is no longer referenced by any
/// live (non-deleted) message.
pub(crate) async fn prune_orphan_attachments(
    conn: &mut SqliteConnection,
    login_id: &str,
) -> StoreResult<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM attachment_cache
        WHERE login_id = ?
          AND record_name NOT IN (
              SELECT json_extract(je.value, '$.record_name')
              FROM message, json_each(message.attachments_json) AS je
              WHERE message.login_id = ? AND message.deleted = 0
          )
        "#,
    )
    .bind(login_id)
    .bind(login_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}
