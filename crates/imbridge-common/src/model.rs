// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core data model: cloud-observed chats and messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::portal::PortalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatStyle {
    Group,
    Dm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatService {
    Primary,
    Legacy,
}

/// A snapshot of a conversation as seen in the cloud backup store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    /// Unstable per-snapshot opaque string.
    pub chat_identifier: String,
    /// Stable UUID across member changes for the same logical conversation.
    pub group_id: Option<uuid::Uuid>,
    /// Unique per-record hash.
    pub record_name: String,
    pub style: ChatStyle,
    pub service: ChatService,
    pub display_name: Option<String>,
    pub participants: BTreeSet<String>,
    pub updated_timestamp: DateTime<Utc>,
    /// Raw field passed through unexamined; it isn't known whether it forms
    /// a linear or branching chain.
    pub original_group_id: Option<String>,
}

impl Chat {
    pub fn is_group(&self) -> bool {
        match self.style {
            ChatStyle::Group => true,
            ChatStyle::Dm => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TapbackType {
    Like,
    Love,
    Dislike,
    Laugh,
    Emphasis,
    Question,
    Emoji,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapbackDescriptor {
    pub target_guid: String,
    pub tapback_type: TapbackType,
    pub emoji: Option<String>,
    pub remove: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditDescriptor {
    pub target_guid: String,
    pub new_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub record_name: String,
    pub mime_type: String,
    pub filename: String,
    pub size_bytes: Option<u64>,
}

/// Maximum hydration attempts for one attachment before it is abandoned
/// with a warning.
pub const MAX_ATTACHMENT_ATTEMPTS: u32 = 3;

/// In-memory bookkeeping for a failing attachment download. Never
/// persisted: a restart gives every attachment a fresh attempt budget.
#[derive(Debug, Clone)]
pub struct FailedAttachmentEntry {
    pub attempt_count: u32,
    pub last_error: String,
    pub last_attempt_time: DateTime<Utc>,
}

impl FailedAttachmentEntry {
    pub fn abandoned(&self) -> bool {
        self.attempt_count >= MAX_ATTACHMENT_ATTEMPTS
    }
}

/// Reference to the chat a message belongs to, in whichever form it arrived
/// labelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReference {
    ChatIdentifier(String),
    GroupId(String),
    RecordName(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Globally unique, assigned by originator.
    pub guid: String,
    pub record_name: Option<String>,
    pub portal_id: Option<PortalId>,
    pub timestamp_ms: i64,
    /// Nullable; `None` implies self.
    pub sender: Option<String>,
    pub is_from_me: bool,
    pub text: Option<String>,
    pub subject: Option<String>,
    pub service: ChatService,
    pub deleted: bool,
    pub tapback: Option<TapbackDescriptor>,
    pub edit: Option<EditDescriptor>,
    pub attachments: Vec<AttachmentMeta>,
}

impl Message {
    /// Ordering key used for (timestamp_ms, guid) lexicographic tie-breaks.
    pub fn order_key(&self) -> (i64, &str) {
        (self.timestamp_ms, self.guid.as_str())
    }
}
