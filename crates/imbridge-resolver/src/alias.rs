// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! UUID drift reconciliation. When a push
//! message's `sender_guid` matches no existing chat but its participant
//! set matches an existing group, the new UUID is treated as an alias of
//! the existing `group_id` rather than spawning a duplicate portal.

use std::collections::BTreeSet;

use async_trait::async_trait;
use imbridge_common::PortalId;
use uuid::Uuid;

use crate::lookup::ChatLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasSource {
    Cloud,
    Push,
    OriginalGroupIdChain,
    LegacyIdentifiers,
}

#[async_trait]
pub trait AliasLookup: Send + Sync {
    async fn find_canonical_group(&self, alias: Uuid) -> Option<Uuid>;

    async fn persist_alias(&self, alias: Uuid, canonical: Uuid, source: AliasSource);
}

/// Attempts to reconcile a drifting `sender_guid` with an existing group's
/// canonical `group_id` via its participant set. Persists the alias on
/// success so future lookups short-circuit straight to the canonical id.
pub async fn reconcile_group_alias<L>(
    lookup: &L,
    new_uuid: Uuid,
    participants: &BTreeSet<String>,
) -> Option<PortalId>
where
    L: ChatLookup + AliasLookup,
{
    if let Some(canonical) = lookup.find_canonical_group(new_uuid).await {
        return Some(PortalId::group(canonical));
    }

    for portal in lookup.find_portals_by_participants(participants).await {
        if let PortalId::Group(canonical) = portal {
            lookup
                .persist_alias(new_uuid, canonical, AliasSource::Push)
                .await;
            return Some(PortalId::group(canonical));
        }
    }

    None
}
