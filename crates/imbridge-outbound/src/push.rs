// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Portal-to-conversation translation and the protocol-send collaborator.

use async_trait::async_trait;
use imbridge_common::{PortalId, TapbackType};

use crate::error::OutboundResult;

/// The shape a portal takes once translated for the protocol client. A
/// `gid:` portal's UUID becomes the outgoing sender_guid so recipients
/// reply with the same UUID; a DM carries the two-party participant list
/// with no sender_guid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationTarget {
    Group { sender_guid: uuid::Uuid },
    Dm { participants: [String; 2] },
}

/// Translates a portal into the form the protocol client expects, given
/// the identifier of the locally authenticated account.
pub fn translate_target(portal: &PortalId, self_identifier: &str) -> ConversationTarget {
    match portal {
        PortalId::Group(group_id) => ConversationTarget::Group { sender_guid: *group_id },
        PortalId::Dm(remote) => {
            ConversationTarget::Dm { participants: [self_identifier.to_string(), remote.clone()] }
        }
    }
}

/// The protocol client collaborator, send-side half of the push boundary.
#[async_trait]
pub trait PushClient: Send + Sync {
    async fn send_text(&self, target: &ConversationTarget, text: &str) -> OutboundResult<String>;

    async fn send_attachment(
        &self,
        target: &ConversationTarget,
        bytes: Vec<u8>,
        mime: &str,
        filename: &str,
    ) -> OutboundResult<String>;

    async fn send_edit(&self, target: &ConversationTarget, target_guid: &str, new_text: &str) -> OutboundResult<()>;

    async fn send_unsend(&self, target: &ConversationTarget, target_guid: &str) -> OutboundResult<()>;

    async fn send_reaction(
        &self,
        target: &ConversationTarget,
        target_guid: &str,
        tapback_type: TapbackType,
        add: bool,
    ) -> OutboundResult<()>;

    async fn send_typing(&self, target: &ConversationTarget, on: bool) -> OutboundResult<()>;

    async fn send_read_receipt(&self, target: &ConversationTarget, up_to_guid: &str) -> OutboundResult<()>;

    async fn send_delivery_receipt(&self, target: &ConversationTarget, for_guid: &str) -> OutboundResult<()>;
}
