// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use chrono::Utc;
use imbridge_resolver::AliasSource;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::error::StoreResult;

fn source_to_str(source: AliasSource) -> &'static str {
    match source {
        AliasSource::Cloud => "cloud",
        AliasSource::Push => "push",
        AliasSource::OriginalGroupIdChain => "original-group-id-chain",
        AliasSource::LegacyIdentifiers => "legacy-identifiers",
    }
}

pub(crate) async fn find_canonical_group(
    conn: &mut SqliteConnection,
    login_id: &str,
    alias: Uuid,
) -> StoreResult<Option<Uuid>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT canonical_group_id FROM chat_alias WHERE login_id = ? AND alias_uuid = ?",
    )
    .bind(login_id)
    .bind(alias.hyphenated().to_string())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.and_then(|(s,)| Uuid::parse_str(&s).ok()))
}

pub(crate) async fn persist_alias(
    conn: &mut SqliteConnection,
    login_id: &str,
    alias: Uuid,
    canonical: Uuid,
    source: AliasSource,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO chat_alias (login_id, alias_uuid, canonical_group_id, source, created_ts)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (login_id, alias_uuid) DO UPDATE SET
            canonical_group_id = excluded.canonical_group_id,
            source = excluded.source
        "#,
    )
    .bind(login_id)
    .bind(alias.hyphenated().to_string())
    .bind(canonical.hyphenated().to_string())
    .bind(source_to_str(source))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
