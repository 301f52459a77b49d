// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use imbridge_common::{DeletionTombstone, PortalId, SyncState, Zone};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::attachments::{self, AttachmentCacheEntry};
use crate::chats::{self, ChatUpsert};
use crate::error::StoreResult;
use crate::messages::{self, MessageUpsert};
use crate::sync_tokens;
use crate::tombstones;
use crate::pool;

/// Bound on the size of a single upsert transaction: batch operations
/// bound transactions at 500 rows per page.
pub const MAX_BATCH_ROWS: usize = 500;

/// Durable cache of chats, messages, sync tokens and tombstones for one
/// login. Exclusive writer; many readers; one transaction
/// per batch operation.
#[derive(Clone)]
pub struct ShadowStore {
    pool: SqlitePool,
    login_id: String,
}

impl ShadowStore {
    pub async fn open(login_id: impl Into<String>, database_path: &str) -> StoreResult<Self> {
        let pool = pool::open(database_path).await?;
        Ok(Self {
            pool,
            login_id: login_id.into(),
        })
    }

    pub async fn open_in_memory(login_id: impl Into<String>) -> StoreResult<Self> {
        let pool = pool::open_in_memory().await?;
        Ok(Self {
            pool,
            login_id: login_id.into(),
        })
    }

    pub fn login_id(&self) -> &str {
        &self.login_id
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Atomically upserts a batch of chats, one transaction per batch.
    /// On a transient failure the whole batch is rolled back so the caller
    /// can retry without having advanced anything.
    pub async fn upsert_chat(&self, batch: &[ChatUpsert]) -> StoreResult<()> {
        for chunk in batch.chunks(MAX_BATCH_ROWS) {
            let mut tx = self.pool.begin().await?;
            for item in chunk {
                chats::upsert_chat_one(&mut tx, &self.login_id, item).await?;
            }
            tx.commit().await?;
        }
        Ok(())
    }

    pub async fn upsert_message(&self, batch: &[MessageUpsert]) -> StoreResult<()> {
        for chunk in batch.chunks(MAX_BATCH_ROWS) {
            let mut tx = self.pool.begin().await?;
            for item in chunk {
                messages::upsert_message_one(&mut tx, &self.login_id, item).await?;
            }
            tx.commit().await?;
        }
        Ok(())
    }

    pub async fn has_message(&self, guid: &str) -> StoreResult<bool> {
        let mut conn = self.pool.acquire().await?;
        messages::has_message(&mut conn, &self.login_id, guid).await
    }

    pub async fn find_portal_for_message(&self, guid: &str) -> StoreResult<Option<PortalId>> {
        let mut conn = self.pool.acquire().await?;
        messages::find_portal_by_guid(&mut conn, &self.login_id, guid).await
    }

    pub async fn has_chat(&self, cloud_chat_id: &str) -> StoreResult<bool> {
        let mut conn = self.pool.acquire().await?;
        chats::has_chat(&mut conn, &self.login_id, cloud_chat_id).await
    }

    pub async fn list_forward_messages(
        &self,
        portal: &PortalId,
        after: Option<(i64, &str)>,
        count: usize,
    ) -> StoreResult<Vec<imbridge_common::Message>> {
        let mut conn = self.pool.acquire().await?;
        messages::list_forward_messages(&mut conn, &self.login_id, portal, after, count).await
    }

    pub async fn list_backward_messages(
        &self,
        portal: &PortalId,
        before: Option<(i64, &str)>,
        count: usize,
    ) -> StoreResult<Vec<imbridge_common::Message>> {
        let mut conn = self.pool.acquire().await?;
        messages::list_backward_messages(&mut conn, &self.login_id, portal, before, count).await
    }

    pub async fn get_sync_token(&self, zone: Zone) -> StoreResult<Option<SyncState>> {
        let mut conn = self.pool.acquire().await?;
        sync_tokens::get_sync_token(&mut conn, &self.login_id, zone).await
    }

    pub async fn set_sync_token_success(&self, zone: Zone, token: Option<&[u8]>) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        sync_tokens::set_sync_token_success(&mut conn, &self.login_id, zone, token).await
    }

    pub async fn set_sync_token_error(&self, zone: Zone, err: &str) -> StoreResult<()> {
        warn!(%err, zone = zone.as_str(), "sync page failed, leaving token in place");
        let mut conn = self.pool.acquire().await?;
        sync_tokens::set_sync_token_error(&mut conn, &self.login_id, zone, err).await
    }

    /// Bootstrap special case: called once when the message
    /// table is empty, to force a full re-scan even if stale tokens exist.
    pub async fn clear_sync_tokens_for_bootstrap(&self) -> StoreResult<()> {
        info!("bootstrapping: clearing sync tokens for full re-scan");
        let mut conn = self.pool.acquire().await?;
        sync_tokens::clear_all_tokens(&mut conn, &self.login_id).await
    }

    pub async fn has_any_messages(&self) -> StoreResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM message WHERE login_id = ? LIMIT 1")
                .bind(&self.login_id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(row.is_some())
    }

    pub async fn record_deletion_tombstone(
        &self,
        portal_id: &PortalId,
        deleted_ts: DateTime<Utc>,
        conv_hash: &str,
    ) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        tombstones::record_deletion_tombstone(&mut conn, &self.login_id, portal_id, deleted_ts, conv_hash)
            .await
    }

    pub async fn clear_deletion_tombstone(&self, portal_id: &PortalId) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        tombstones::clear_deletion_tombstone(&mut conn, &self.login_id, portal_id).await
    }

    pub async fn find_tombstone(&self, portal_id: &PortalId) -> StoreResult<Option<DeletionTombstone>> {
        let mut conn = self.pool.acquire().await?;
        tombstones::find_tombstone(&mut conn, &self.login_id, portal_id).await
    }

    pub async fn list_deletion_tombstones(&self) -> StoreResult<Vec<DeletionTombstone>> {
        let mut conn = self.pool.acquire().await?;
        tombstones::list_deletion_tombstones(&mut conn, &self.login_id).await
    }

    pub async fn find_portals_by_group_id(&self, group_id: Uuid) -> StoreResult<Vec<PortalId>> {
        let mut conn = self.pool.acquire().await?;
        chats::find_portals_by_group_id(&mut conn, &self.login_id, group_id).await
    }

    pub async fn find_portals_by_participants(
        &self,
        participants: &BTreeSet<String>,
    ) -> StoreResult<Vec<PortalId>> {
        let mut conn = self.pool.acquire().await?;
        chats::find_portals_by_participants(&mut conn, &self.login_id, participants).await
    }

    pub async fn prune_orphan_attachments(&self) -> StoreResult<u64> {
        let mut conn = self.pool.acquire().await?;
        attachments::prune_orphan_attachments(&mut conn, &self.login_id).await
    }

    pub async fn prune_tombstoned_messages(&self) -> StoreResult<u64> {
        let mut conn = self.pool.acquire().await?;
        messages::prune_tombstoned_messages(&mut conn, &self.login_id).await
    }

    pub async fn purge_messages_for_portal(&self, portal: &PortalId) -> StoreResult<u64> {
        let mut conn = self.pool.acquire().await?;
        messages::purge_messages_for_portal(&mut conn, &self.login_id, portal).await
    }

    pub async fn cache_attachment(&self, entry: &AttachmentCacheEntry) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        attachments::cache_attachment(&mut conn, &self.login_id, entry).await
    }

    pub async fn lookup_attachment(&self, record_name: &str) -> StoreResult<Option<AttachmentCacheEntry>> {
        let mut conn = self.pool.acquire().await?;
        attachments::lookup_attachment(&mut conn, &self.login_id, record_name).await
    }

    pub async fn load_chat(&self, cloud_chat_id: &str) -> StoreResult<Option<imbridge_common::Chat>> {
        let mut conn = self.pool.acquire().await?;
        chats::load_chat(&mut conn, &self.login_id, cloud_chat_id).await
    }
}
