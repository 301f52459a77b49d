// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Translates sink-originated actions into protocol sends.

use std::sync::Arc;

use imbridge_common::{PortalId, TapbackType};
use imbridge_dispatch::{Dispatcher, Sink};
use imbridge_resolver::{ContactSource, NoContacts};
use tracing::debug;

use crate::error::OutboundResult;
use crate::push::{translate_target, PushClient};

const OGG_OPUS_MIME: &str = "audio/ogg";
const CAF_OPUS_MIME: &str = "audio/x-caf";

pub struct OutboundAdapter<P, S, C = NoContacts> {
    pub(crate) push: P,
    dispatcher: Arc<Dispatcher<S, C>>,
    self_identifier: String,
}

impl<P: PushClient, S: Sink> OutboundAdapter<P, S, NoContacts> {
    pub fn new(push: P, dispatcher: Arc<Dispatcher<S, NoContacts>>, self_identifier: impl Into<String>) -> Self {
        Self { push, dispatcher, self_identifier: self_identifier.into() }
    }
}

impl<P: PushClient, S: Sink, C: ContactSource> OutboundAdapter<P, S, C> {
    pub fn with_dispatcher(push: P, dispatcher: Arc<Dispatcher<S, C>>, self_identifier: impl Into<String>) -> Self {
        Self { push, dispatcher, self_identifier: self_identifier.into() }
    }

    pub async fn send_text(&self, portal: &PortalId, text: &str) -> OutboundResult<String> {
        let target = translate_target(portal, &self.self_identifier);
        self.push.send_text(&target, text).await
    }

    /// Voice messages arrive from the sink as OGG Opus and are remuxed to
    /// CAF Opus before the protocol send; every other attachment kind
    /// passes through untouched.
    pub async fn send_attachment(
        &self,
        portal: &PortalId,
        bytes: Vec<u8>,
        mime: &str,
        filename: &str,
    ) -> OutboundResult<String> {
        let target = translate_target(portal, &self.self_identifier);
        let (bytes, mime) = if mime.eq_ignore_ascii_case(OGG_OPUS_MIME) {
            (crate::audio::ogg_opus_to_caf(&bytes)?, CAF_OPUS_MIME)
        } else {
            (bytes, mime)
        };
        self.push.send_attachment(&target, bytes, mime, filename).await
    }

    pub async fn send_edit(&self, portal: &PortalId, target_guid: &str, new_text: &str) -> OutboundResult<()> {
        let target = translate_target(portal, &self.self_identifier);
        self.push.send_edit(&target, target_guid, new_text).await
    }

    /// Marks the guid in the dispatcher's echo-suppression set before
    /// asking the protocol to unsend it, so the eventual push re-delivery
    /// of our own unsend is dropped rather than surfaced back to the sink.
    pub async fn send_unsend(&self, portal: &PortalId, target_guid: &str) -> OutboundResult<()> {
        self.dispatcher.mark_unsent(target_guid.to_string()).await;
        let target = translate_target(portal, &self.self_identifier);
        self.push.send_unsend(&target, target_guid).await
    }

    pub async fn send_reaction(
        &self,
        portal: &PortalId,
        target_guid: &str,
        tapback_type: TapbackType,
        add: bool,
    ) -> OutboundResult<()> {
        let target = translate_target(portal, &self.self_identifier);
        self.push.send_reaction(&target, target_guid, tapback_type, add).await
    }

    pub async fn send_typing(&self, portal: &PortalId, on: bool) -> OutboundResult<()> {
        let target = translate_target(portal, &self.self_identifier);
        debug!(portal = %portal, on, "forwarding typing indicator");
        self.push.send_typing(&target, on).await
    }

    pub async fn send_read_receipt(&self, portal: &PortalId, up_to_guid: &str) -> OutboundResult<()> {
        let target = translate_target(portal, &self.self_identifier);
        self.push.send_read_receipt(&target, up_to_guid).await
    }

    pub async fn send_delivery_receipt(&self, portal: &PortalId, for_guid: &str) -> OutboundResult<()> {
        let target = translate_target(portal, &self.self_identifier);
        self.push.send_delivery_receipt(&target, for_guid).await
    }
}
