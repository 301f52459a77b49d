// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Push event taxonomy and its sink-facing translation.
//! One tagged sum for every push variant; the dispatcher matches on it.

use imbridge_common::{AttachmentMeta, ChatReference, ChatService, TapbackType};

/// A push event as delivered by the protocol client's callback.
#[derive(Debug, Clone)]
pub enum PushEvent {
    Message {
        guid: String,
        chat_reference: ChatReference,
        /// Participants known from the push payload, used only for the
        /// group/DM discrimination rule when no explicit style is carried.
        participant_count: usize,
        group_name: Option<String>,
        sender: Option<String>,
        is_from_me: bool,
        text: Option<String>,
        subject: Option<String>,
        attachments: Vec<AttachmentMeta>,
        timestamp_ms: i64,
        service: ChatService,
        /// Carries a delivery-acknowledgment hint distinct from a read
        /// receipt.
        send_delivered: bool,
    },
    Tapback {
        chat_reference: ChatReference,
        sender: Option<String>,
        is_from_me: bool,
        target_guid: String,
        tapback_type: TapbackType,
        emoji: Option<String>,
        remove: bool,
    },
    Edit {
        chat_reference: ChatReference,
        target_guid: String,
        new_text: String,
    },
    Unsend {
        target_guid: String,
    },
    ReadReceipt {
        target_guid: String,
        reader: Option<String>,
    },
    DeliveryReceipt {
        target_guid: String,
    },
    Typing {
        chat_reference: ChatReference,
        participant: Option<String>,
        on: bool,
    },
    ParticipantChange {
        chat_reference: ChatReference,
        new_participants: std::collections::BTreeSet<String>,
    },
    Rename {
        chat_reference: ChatReference,
        new_name: Option<String>,
    },
    Error {
        for_guid: String,
        status: i32,
        status_str: String,
    },
    PeerCacheInvalidate,
}

/// The dispatcher's translation of a `PushEvent` for the sink.
/// `PeerCacheInvalidate` has no portal and is delivered to the sink
/// through a dedicated call instead of `queue_event`.
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Message {
        guid: String,
        sender: Option<String>,
        is_from_me: bool,
        text: Option<String>,
        subject: Option<String>,
        attachments: Vec<AttachmentMeta>,
        timestamp_ms: i64,
    },
    Tapback {
        sender: Option<String>,
        target_guid: String,
        tapback_type: TapbackType,
        emoji: Option<String>,
        remove: bool,
    },
    Edit {
        target_guid: String,
        new_text: String,
    },
    Unsend {
        target_guid: String,
    },
    ReadReceipt {
        target_guid: String,
        reader: Option<String>,
    },
    DeliveryReceipt {
        target_guid: String,
    },
    Typing {
        participant: Option<String>,
        on: bool,
    },
    ParticipantChange {
        new_participants: std::collections::BTreeSet<String>,
    },
    Rename {
        new_name: Option<String>,
    },
    Error {
        for_guid: String,
        status: i32,
        status_str: String,
    },
}
