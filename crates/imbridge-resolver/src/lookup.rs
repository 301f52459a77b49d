// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Collaborator traits the resolver consumes. Implemented by
//! `imbridge-store` against the shadow database, and optionally by a
//! contacts provider.

use async_trait::async_trait;
use imbridge_common::PortalId;
use std::collections::BTreeSet;
use uuid::Uuid;

/// The chat table indexed by any of chat_identifier / record_name /
/// lowercased group_id.
#[async_trait]
pub trait ChatLookup: Send + Sync {
    async fn find_chat_portal(&self, reference: &str) -> Option<PortalId>;

    async fn find_portals_by_group_id(&self, group_id: Uuid) -> Vec<PortalId>;

    async fn find_portals_by_participants(&self, participants: &BTreeSet<String>)
        -> Vec<PortalId>;
}

#[derive(Debug, Clone, Default)]
pub struct Contact {
    pub names: Vec<String>,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
}

impl Contact {
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.phones
            .iter()
            .chain(self.emails.iter())
            .map(String::as_str)
    }
}

/// Optional external contact source.
#[async_trait]
pub trait ContactSource: Send + Sync {
    async fn lookup(&self, identifier: &str) -> Option<Contact>;
}

/// No contact source configured; contact merging is skipped entirely.
pub struct NoContacts;

#[async_trait]
impl ContactSource for NoContacts {
    async fn lookup(&self, _identifier: &str) -> Option<Contact> {
        None
    }
}
