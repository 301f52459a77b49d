// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::{DateTime, Utc};
use imbridge_common::{DeletionTombstone, PortalId};
use sqlx::SqliteConnection;

use crate::error::StoreResult;

#[derive(sqlx::FromRow)]
struct TombstoneRow {
    portal_id: String,
    deleted_ts: DateTime<Utc>,
    conv_hash: String,
}

pub(crate) async fn record_deletion_tombstone(
    conn: &mut SqliteConnection,
    login_id: &str,
    portal_id: &PortalId,
    deleted_ts: DateTime<Utc>,
    conv_hash: &str,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO deleted_portal (login_id, portal_id, deleted_ts, conv_hash)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (login_id, portal_id) DO UPDATE SET
            deleted_ts = excluded.deleted_ts,
            conv_hash = excluded.conv_hash
        "#,
    )
    .bind(login_id)
    .bind(portal_id.to_string())
    .bind(deleted_ts)
    .bind(conv_hash)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Allowed only by the caller's own invariant check: a message with
/// timestamp strictly greater than `deleted_timestamp` must have arrived
/// first.
pub(crate) async fn clear_deletion_tombstone(
    conn: &mut SqliteConnection,
    login_id: &str,
    portal_id: &PortalId,
) -> StoreResult<()> {
    sqlx::query("DELETE FROM deleted_portal WHERE login_id = ? AND portal_id = ?")
        .bind(login_id)
        .bind(portal_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn find_tombstone(
    conn: &mut SqliteConnection,
    login_id: &str,
    portal_id: &PortalId,
) -> StoreResult<Option<DeletionTombstone>> {
    let row: Option<TombstoneRow> = sqlx::query_as(
        "SELECT portal_id, deleted_ts, conv_hash FROM deleted_portal WHERE login_id = ? AND portal_id = ?",
    )
    .bind(login_id)
    .bind(portal_id.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    row.map(row_to_tombstone).transpose()
}

pub(crate) async fn list_deletion_tombstones(
    conn: &mut SqliteConnection,
    login_id: &str,
) -> StoreResult<Vec<DeletionTombstone>> {
    let rows: Vec<TombstoneRow> =
        sqlx::query_as("SELECT portal_id, deleted_ts, conv_hash FROM deleted_portal WHERE login_id = ?")
            .bind(login_id)
            .fetch_all(&mut *conn)
            .await?;
    rows.into_iter().map(row_to_tombstone).collect()
}

fn row_to_tombstone(row: TombstoneRow) -> StoreResult<DeletionTombstone> {
    Ok(DeletionTombstone {
        portal_id: row
            .portal_id
            .parse()
            .map_err(|_| crate::error::StoreError::InvalidPortalId(row.portal_id.clone()))?,
        deleted_timestamp: row.deleted_ts,
        conversation_hash: row.conv_hash,
    })
}
