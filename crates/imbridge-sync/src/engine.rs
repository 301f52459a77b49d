// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Cloud Sync Engine: a per-zone pagination loop that
//! decrypts each record, resolves its portal and upserts it into the
//! shadow store in bounded transactions, persisting a continuation token
//! after every successfully-applied page.

use std::collections::BTreeSet;

use imbridge_common::{Chat, ChatReference, Message, Zone};
use imbridge_resolver::resolve::{resolve_chat_portal, resolve_portal, ResolutionInput};
use imbridge_resolver::reconcile_group_alias;
use imbridge_store::{ChatUpsert, MessageUpsert, ShadowStore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{CloudSyncClient, DecodedChatFields, DecodedMessageFields, Decryptor, RawRecord};
use crate::error::{SyncError, SyncResult};

/// Hard cap on pages fetched per invocation: guards against
/// a misbehaving server handing back an endless, non-stalling stream.
const MAX_PAGES_PER_RUN: u32 = 256;

/// Advisory retry budget for a single record's decryption.
const MAX_DECRYPT_RETRIES: u32 = 4;

pub struct SyncEngine<C, D> {
    store: ShadowStore,
    client: C,
    decryptor: D,
}

impl<C: CloudSyncClient, D: Decryptor> SyncEngine<C, D> {
    pub fn new(store: ShadowStore, client: C, decryptor: D) -> Self {
        Self { store, client, decryptor }
    }

    /// Runs both zones in order (CHATS then MESSAGES) and the post-sync
    /// housekeeping pass. Applies the bootstrap special case
    /// first: if the store has never seen a message, all zone tokens are
    /// cleared so the run performs a full re-scan even if stale tokens
    /// survive from a prior install.
    pub async fn run_full_sync(&self) -> SyncResult<()> {
        if !self.store.has_any_messages().await? {
            self.store.clear_sync_tokens_for_bootstrap().await?;
        }

        self.sync_zone_chats().await?;
        self.sync_zone_messages().await?;

        let pruned_attachments = self.store.prune_orphan_attachments().await?;
        let pruned_messages = self.store.prune_tombstoned_messages().await?;
        info!(
            pruned_attachments,
            pruned_messages,
            "post-sync housekeeping complete"
        );
        Ok(())
    }

    async fn sync_zone_chats(&self) -> SyncResult<()> {
        let mut token = self
            .store
            .get_sync_token(Zone::Chats)
            .await?
            .and_then(|s| s.continuation_token);

        for page_no in 0..MAX_PAGES_PER_RUN {
            let page = match self.client.sync_chats(token.clone()).await {
                Ok(page) => page,
                Err(err) => {
                    self.store
                        .set_sync_token_error(Zone::Chats, &err.to_string())
                        .await?;
                    return Err(err);
                }
            };

            let mut batch = Vec::with_capacity(page.records.len());
            for raw in &page.records {
                let Some(fields) = self.decrypt_chat_with_retry(raw).await? else {
                    continue;
                };
                if let Some(original) = &fields.original_group_id {
                    debug!(
                        chat_identifier = %fields.chat_identifier,
                        original_group_id = %original,
                        "original_group_id observed, passed through unexamined"
                    );
                }
                let chat = Chat {
                    chat_identifier: fields.chat_identifier.clone(),
                    group_id: fields.group_id,
                    record_name: raw.record_name.clone(),
                    style: fields.style,
                    service: fields.service,
                    display_name: fields.display_name.clone(),
                    participants: fields.participants.clone(),
                    updated_timestamp: fields.updated_timestamp,
                    original_group_id: fields.original_group_id.clone(),
                };
                let portal_id = resolve_chat_portal(&chat);
                batch.push(ChatUpsert {
                    chat,
                    portal_id,
                    needs_reconciliation: false,
                });
            }
            self.store.upsert_chat(&batch).await?;

            let stalled = !page.done && page.new_token == token;
            if stalled {
                warn!(page_no, "chats zone: continuation token did not advance, stopping");
            }
            self.store
                .set_sync_token_success(Zone::Chats, page.new_token.as_deref())
                .await?;
            token = page.new_token.clone();

            if page.done || stalled {
                return Ok(());
            }
        }
        warn!("chats zone: hit the per-run page cap, continuing on next invocation");
        Ok(())
    }

    async fn sync_zone_messages(&self) -> SyncResult<()> {
        let mut token = self
            .store
            .get_sync_token(Zone::Messages)
            .await?
            .and_then(|s| s.continuation_token);

        for page_no in 0..MAX_PAGES_PER_RUN {
            let page = match self.client.sync_messages(token.clone()).await {
                Ok(page) => page,
                Err(err) => {
                    self.store
                        .set_sync_token_error(Zone::Messages, &err.to_string())
                        .await?;
                    return Err(err);
                }
            };

            let mut batch = Vec::with_capacity(page.records.len());
            for raw in &page.records {
                let Some(fields) = self.decrypt_message_with_retry(raw).await? else {
                    continue;
                };
                let reference = chat_reference_str(&fields.chat_reference).to_string();
                let is_group = matches!(fields.chat_reference, ChatReference::GroupId(_));
                let input = ResolutionInput {
                    reference: Some(reference.as_str()),
                    is_group: Some(is_group),
                    sender_uri: fields.sender.as_deref(),
                    is_from_me: fields.is_from_me,
                };
                let mut portal_id = resolve_portal(&self.store, input).await;
                if portal_id.is_none() {
                    if let ChatReference::GroupId(raw) = &fields.chat_reference {
                        if let Ok(candidate) = Uuid::parse_str(raw) {
                            portal_id =
                                reconcile_group_alias(&self.store, candidate, &BTreeSet::new()).await;
                        }
                    }
                }
                if portal_id.is_none() {
                    debug!(
                        guid = %fields.guid,
                        "message stored without a resolved portal; the resolver never invents one"
                    );
                }

                let message = Message {
                    guid: fields.guid.clone(),
                    record_name: Some(raw.record_name.clone()),
                    portal_id,
                    timestamp_ms: fields.timestamp_ms,
                    sender: fields.sender.clone(),
                    is_from_me: fields.is_from_me,
                    text: fields.text.clone(),
                    subject: fields.subject.clone(),
                    service: fields.service,
                    deleted: raw.deleted,
                    tapback: fields.tapback.clone(),
                    edit: fields.edit.clone(),
                    attachments: fields.attachments.clone(),
                };
                batch.push(MessageUpsert {
                    message,
                    chat_id: chat_id_from_reference(&fields.chat_reference),
                });
            }
            self.store.upsert_message(&batch).await?;

            let stalled = !page.done && page.new_token == token;
            if stalled {
                warn!(page_no, "messages zone: continuation token did not advance, stopping");
            }
            self.store
                .set_sync_token_success(Zone::Messages, page.new_token.as_deref())
                .await?;
            token = page.new_token.clone();

            if page.done || stalled {
                return Ok(());
            }
        }
        warn!("messages zone: hit the per-run page cap, continuing on next invocation");
        Ok(())
    }

    async fn decrypt_chat_with_retry(&self, raw: &RawRecord) -> SyncResult<Option<DecodedChatFields>> {
        let mut attempt = 0;
        loop {
            match self.decryptor.decrypt_chat(raw).await {
                Ok(fields) => return Ok(fields),
                Err(SyncError::DecryptTransient(msg)) if attempt < MAX_DECRYPT_RETRIES => {
                    attempt += 1;
                    warn!(record_name = %raw.record_name, attempt, %msg, "transient chat decrypt failure, retrying");
                }
                Err(SyncError::DecryptTransient(msg)) => {
                    warn!(record_name = %raw.record_name, %msg, "chat decrypt failed after retries, skipping record");
                    return Ok(None);
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn decrypt_message_with_retry(
        &self,
        raw: &RawRecord,
    ) -> SyncResult<Option<DecodedMessageFields>> {
        let mut attempt = 0;
        loop {
            match self.decryptor.decrypt_message(raw).await {
                Ok(fields) => return Ok(fields),
                Err(SyncError::DecryptTransient(msg)) if attempt < MAX_DECRYPT_RETRIES => {
                    attempt += 1;
                    warn!(record_name = %raw.record_name, attempt, %msg, "transient message decrypt failure, retrying");
                }
                Err(SyncError::DecryptTransient(msg)) => {
                    warn!(record_name = %raw.record_name, %msg, "message decrypt failed after retries, skipping record");
                    return Ok(None);
                }
                Err(other) => return Err(other),
            }
        }
    }
}

fn chat_reference_str(reference: &ChatReference) -> &str {
    match reference {
        ChatReference::ChatIdentifier(s) => s,
        ChatReference::GroupId(s) => s,
        ChatReference::RecordName(s) => s,
    }
}

/// Only a chat_identifier-flavoured reference maps onto the `chat_id`
/// foreign key (cloud_chat_id); group ids and record names are resolver
/// input only, not a join key into the chat table.
fn chat_id_from_reference(reference: &ChatReference) -> Option<String> {
    match reference {
        ChatReference::ChatIdentifier(s) => Some(s.clone()),
        _ => None,
    }
}
