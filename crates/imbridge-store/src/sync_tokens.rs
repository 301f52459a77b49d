// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::Utc;
use imbridge_common::{SyncState, Zone};
use sqlx::SqliteConnection;

use crate::error::StoreResult;

#[derive(sqlx::FromRow)]
struct SyncStateRow {
    continuation_token: Option<Vec<u8>>,
    last_success_ts: Option<chrono::DateTime<Utc>>,
    last_error: Option<String>,
    updated_ts: chrono::DateTime<Utc>,
}

pub(crate) async fn get_sync_token(
    conn: &mut SqliteConnection,
    login_id: &str,
    zone: Zone,
) -> StoreResult<Option<SyncState>> {
    let row: Option<SyncStateRow> = sqlx::query_as(
        "SELECT continuation_token, last_success_ts, last_error, updated_ts \
         FROM sync_state WHERE login_id = ? AND zone = ?",
    )
    .bind(login_id)
    .bind(zone.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|r| SyncState {
        zone,
        continuation_token: r.continuation_token,
        last_success_timestamp: r.last_success_ts,
        last_error: r.last_error,
        updated_timestamp: r.updated_ts,
    }))
}

pub(crate) async fn set_sync_token_success(
    conn: &mut SqliteConnection,
    login_id: &str,
    zone: Zone,
    token: Option<&[u8]>,
) -> StoreResult<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO sync_state (login_id, zone, continuation_token, last_success_ts, last_error, updated_ts)
        VALUES (?, ?, ?, ?, NULL, ?)
        ON CONFLICT (login_id, zone) DO UPDATE SET
            continuation_token = excluded.continuation_token,
            last_success_ts = excluded.last_success_ts,
            last_error = NULL,
            updated_ts = excluded.updated_ts
        "#,
    )
    .bind(login_id)
    .bind(zone.as_str())
    .bind(token)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Leaves the previous token in place; only records the error. A
/// transient store/sync error never advances the token.
pub(crate) async fn set_sync_token_error(
    conn: &mut SqliteConnection,
    login_id: &str,
    zone: Zone,
    err: &str,
) -> StoreResult<()> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO sync_state (login_id, zone, continuation_token, last_success_ts, last_error, updated_ts)
        VALUES (?, ?, NULL, NULL, ?, ?)
        ON CONFLICT (login_id, zone) DO UPDATE SET
            last_error = excluded.last_error,
            updated_ts = excluded.updated_ts
        "#,
    )
    .bind(login_id)
    .bind(zone.as_str())
    .bind(err)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Bootstrap special case: clears all zone tokens so the
/// next sync performs a full re-scan.
pub(crate) async fn clear_all_tokens(conn: &mut SqliteConnection, login_id: &str) -> StoreResult<()> {
    sqlx::query("DELETE FROM sync_state WHERE login_id = ?")
        .bind(login_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
