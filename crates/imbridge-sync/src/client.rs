// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Collaborator boundary: the cloud backup service and the record
//! decryptor. Implemented by the protocol client; fakes
//! back the unit tests below.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use imbridge_common::{ChatReference, ChatService, ChatStyle, EditDescriptor, TapbackDescriptor};
use imbridge_common::AttachmentMeta;

use crate::error::SyncResult;

/// One opaque record as handed back by a zone page, before decryption.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub record_name: String,
    pub ciphertext: Vec<u8>,
    /// Tombstone flag carried alongside the ciphertext; a deleted record
    /// still needs decrypting far enough to know which row it marks.
    pub deleted: bool,
}

/// One page of a zone's pagination: records plus the
/// continuation token to present on the next request.
#[derive(Debug, Clone)]
pub struct SyncPage {
    pub records: Vec<RawRecord>,
    pub new_token: Option<Vec<u8>>,
    pub done: bool,
}

#[async_trait]
pub trait CloudSyncClient: Send + Sync {
    async fn sync_chats(&self, token: Option<Vec<u8>>) -> SyncResult<SyncPage>;
    async fn sync_messages(&self, token: Option<Vec<u8>>) -> SyncResult<SyncPage>;
}

/// Decrypted chat fields, before portal resolution.
#[derive(Debug, Clone)]
pub struct DecodedChatFields {
    pub chat_identifier: String,
    pub group_id: Option<uuid::Uuid>,
    pub style: ChatStyle,
    pub service: ChatService,
    pub display_name: Option<String>,
    pub participants: BTreeSet<String>,
    pub updated_timestamp: DateTime<Utc>,
    /// Passed through unexamined.
    pub original_group_id: Option<String>,
}

/// Decrypted message fields, before portal resolution.
#[derive(Debug, Clone)]
pub struct DecodedMessageFields {
    pub guid: String,
    pub chat_reference: ChatReference,
    pub timestamp_ms: i64,
    pub sender: Option<String>,
    pub is_from_me: bool,
    pub text: Option<String>,
    pub subject: Option<String>,
    pub service: ChatService,
    pub tapback: Option<TapbackDescriptor>,
    pub edit: Option<EditDescriptor>,
    pub attachments: Vec<AttachmentMeta>,
}

/// Decryption may fail transiently (e.g. the per-record key has not yet
/// synced) and is retried up to an advised count before the record is
/// skipped. `Ok(None)` means the record is permanently
/// unreadable (unknown schema, rotated key) and should be skipped without
/// retrying.
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn decrypt_chat(&self, raw: &RawRecord) -> SyncResult<Option<DecodedChatFields>>;
    async fn decrypt_message(&self, raw: &RawRecord) -> SyncResult<Option<DecodedMessageFields>>;
}
