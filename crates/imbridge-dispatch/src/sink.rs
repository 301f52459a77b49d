// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Collaborator boundary: the external sink the dispatcher forwards
//! events to.

use async_trait::async_trait;
use imbridge_common::PortalId;

use crate::error::DispatchResult;
use crate::event::SinkEvent;

#[async_trait]
pub trait Sink: Send + Sync {
    async fn queue_event(&self, portal: &PortalId, event: SinkEvent) -> DispatchResult<()>;

    async fn upload_media(&self, bytes: Vec<u8>, name: &str, mime: &str) -> DispatchResult<String>;

    /// Sink-side room identifier, if a room already exists for this portal.
    async fn get_existing_portal(&self, portal: &PortalId) -> Option<String>;

    /// Not portal-scoped; delivered outside `queue_event`.
    async fn invalidate_peer_cache(&self) -> DispatchResult<()>;
}
