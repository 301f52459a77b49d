// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Implements the resolver's collaborator traits against the shadow
//! database, so `ShadowStore` can be handed directly to
//! `imbridge_resolver::resolve_portal` and `reconcile_group_alias`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use imbridge_common::PortalId;
use imbridge_resolver::{AliasLookup, AliasSource, ChatLookup};
use tracing::error;
use uuid::Uuid;

use crate::store::ShadowStore;
use crate::{aliases, chats};

#[async_trait]
impl ChatLookup for ShadowStore {
    async fn find_chat_portal(&self, reference: &str) -> Option<PortalId> {
        let mut conn = self.pool().acquire().await.ok()?;
        chats::find_chat_portal(&mut conn, self.login_id(), reference)
            .await
            .unwrap_or_else(|err| {
                error!(%err, "find_chat_portal failed");
                None
            })
    }

    async fn find_portals_by_group_id(&self, group_id: Uuid) -> Vec<PortalId> {
        let Ok(mut conn) = self.pool().acquire().await else {
            return Vec::new();
        };
        chats::find_portals_by_group_id(&mut conn, self.login_id(), group_id)
            .await
            .unwrap_or_else(|err| {
                error!(%err, "find_portals_by_group_id failed");
                Vec::new()
            })
    }

    async fn find_portals_by_participants(
        &self,
        participants: &BTreeSet<String>,
    ) -> Vec<PortalId> {
        let Ok(mut conn) = self.pool().acquire().await else {
            return Vec::new();
        };
        chats::find_portals_by_participants(&mut conn, self.login_id(), participants)
            .await
            .unwrap_or_else(|err| {
                error!(%err, "find_portals_by_participants failed");
                Vec::new()
            })
    }
}

#[async_trait]
impl AliasLookup for ShadowStore {
    async fn find_canonical_group(&self, alias: Uuid) -> Option<Uuid> {
        let mut conn = self.pool().acquire().await.ok()?;
        aliases::find_canonical_group(&mut conn, self.login_id(), alias)
            .await
            .unwrap_or_else(|err| {
                error!(%err, "find_canonical_group failed");
                None
            })
    }

    async fn persist_alias(&self, alias: Uuid, canonical: Uuid, source: AliasSource) {
        let Ok(mut conn) = self.pool().acquire().await else {
            return;
        };
        if let Err(err) = aliases::persist_alias(&mut conn, self.login_id(), alias, canonical, source).await
        {
            error!(%err, "persist_alias failed");
        }
    }
}
