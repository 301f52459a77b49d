// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Resolution rules. Applied in order, first match wins.
//! The resolver never invents a UUID: if nothing matches, the caller must
//! skip the record rather than fabricate a portal.

use std::collections::BTreeSet;

use imbridge_common::PortalId;
use uuid::Uuid;

use crate::lookup::{ChatLookup, Contact, ContactSource};
use crate::normalize::normalize_participant_uri;

#[derive(Debug, Clone, Default)]
pub struct ResolutionInput<'a> {
    /// The raw chat_identifier / group_id / record_name carried by the record.
    pub reference: Option<&'a str>,
    /// Whether the message is known to be a group message.
    pub is_group: Option<bool>,
    pub sender_uri: Option<&'a str>,
    pub is_from_me: bool,
}

/// Resolves a chat or message reference to a portal id, per the six
/// ordered rules. Returns `None` when no rule matches; callers must skip
/// the record rather than invent an identifier.
pub async fn resolve_portal<L: ChatLookup>(
    lookup: &L,
    input: ResolutionInput<'_>,
) -> Option<PortalId> {
    let mut reference = input.reference.map(str::to_string);

    // Rules 1-3 iterate: rule 3 strips a `<service>;-;<local>` prefix and
    // restarts rules 1-2 against the local part.
    for _ in 0..2 {
        let Some(r) = reference.as_deref() else {
            break;
        };

        // Rule 1: well-formed UUID and known-group message.
        if input.is_group == Some(true) {
            if let Ok(uuid) = Uuid::parse_str(r) {
                return Some(PortalId::group(uuid));
            }
        }

        // Rule 2: chat table lookup under any of the three columns.
        if let Some(portal) = lookup.find_chat_portal(r).await {
            return Some(portal);
        }

        // Rule 3: `<service>;-;<local>` prefix stripping.
        if let Some(idx) = r.find(";-;") {
            let local = r[idx + 3..].to_string();
            reference = Some(local);
            continue;
        }

        break;
    }

    // Rule 4: non-self sender URI, normalized.
    if !input.is_from_me {
        if let Some(sender) = input.sender_uri {
            if let Some(normalized) = normalize_participant_uri(sender) {
                if let Ok(portal) = normalized.parse() {
                    return Some(portal);
                }
            }
        }
    }

    // Rule 5: from-self with a parseable destination in the chat reference.
    if input.is_from_me {
        if let Some(r) = reference.as_deref() {
            if let Some(normalized) = normalize_participant_uri(r) {
                if let Ok(portal) = normalized.parse() {
                    return Some(portal);
                }
            }
        }
    }

    // Rule 6: unresolved, skip.
    None
}

/// Resolves a cloud chat record directly: group chats resolve via their
/// stable `group_id`; DMs resolve via their (single) normalized participant.
pub fn resolve_chat_portal(chat: &imbridge_common::Chat) -> Option<PortalId> {
    if chat.is_group() {
        chat.group_id.map(PortalId::group)
    } else {
        chat.participants
            .iter()
            .find_map(|p| normalize_participant_uri(p))
            .and_then(|uri| uri.parse().ok())
    }
}

/// Group/DM discrimination for push-originated messages lacking `style`:
/// more than two participants, or a group name, means group.
pub fn classify_push_conversation(participant_count: usize, has_group_name: bool) -> bool {
    participant_count > 2 || has_group_name
}

/// Contact merging. If the candidate DM portal's
/// identifier belongs to a contact that already has a portal under one of
/// its other identifiers, returns that existing portal instead.
pub async fn merge_portal<C, L>(contacts: &C, lookup: &L, candidate: PortalId) -> PortalId
where
    C: ContactSource,
    L: ChatLookup,
{
    let PortalId::Dm(uri) = &candidate else {
        return candidate;
    };
    let Some(contact) = contacts.lookup(uri).await else {
        return candidate;
    };
    for alt in contact.identifiers() {
        if alt == uri {
            continue;
        }
        let Some(normalized) = normalize_participant_uri(alt) else {
            continue;
        };
        if normalized == *uri {
            continue;
        }
        let mut singleton = BTreeSet::new();
        singleton.insert(normalized.clone());
        if !lookup.find_portals_by_participants(&singleton).await.is_empty() {
            if let Ok(existing) = normalized.parse::<PortalId>() {
                return existing;
            }
        }
    }
    candidate
}

/// Validates send-side reachability of a multi-identifier contact,
/// returning the first identifier the protocol confirms is reachable.
pub fn pick_reachable<'a>(contact: &'a Contact, reachable: &BTreeSet<String>) -> Option<&'a str> {
    contact
        .identifiers()
        .find(|id| reachable.contains(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeLookup {
        by_reference: Mutex<HashMap<String, PortalId>>,
        by_participants: Mutex<HashMap<BTreeSet<String>, PortalId>>,
    }

    #[async_trait]
    impl ChatLookup for FakeLookup {
        async fn find_chat_portal(&self, reference: &str) -> Option<PortalId> {
            self.by_reference.lock().unwrap().get(reference).cloned()
        }

        async fn find_portals_by_group_id(&self, group_id: Uuid) -> Vec<PortalId> {
            self.by_reference
                .lock()
                .unwrap()
                .values()
                .filter(|p| matches!(p, PortalId::Group(g) if *g == group_id))
                .cloned()
                .collect()
        }

        async fn find_portals_by_participants(
            &self,
            participants: &BTreeSet<String>,
        ) -> Vec<PortalId> {
            self.by_participants
                .lock()
                .unwrap()
                .get(participants)
                .cloned()
                .into_iter()
                .collect()
        }
    }

    #[tokio::test]
    async fn rule1_group_uuid_wins_over_everything() {
        let lookup = FakeLookup::default();
        let uuid = Uuid::new_v4();
        let input = ResolutionInput {
            reference: Some(&uuid.to_string()),
            is_group: Some(true),
            sender_uri: None,
            is_from_me: false,
        };
        let portal = resolve_portal(&lookup, input).await.unwrap();
        assert_eq!(portal, PortalId::group(uuid));
    }

    #[tokio::test]
    async fn rule2_chat_table_lookup() {
        let lookup = FakeLookup::default();
        let portal = PortalId::dm_phone("tel:+14155551111");
        lookup
            .by_reference
            .lock()
            .unwrap()
            .insert("chat407".into(), portal.clone());
        let input = ResolutionInput {
            reference: Some("chat407"),
            ..Default::default()
        };
        assert_eq!(resolve_portal(&lookup, input).await, Some(portal));
    }

    #[tokio::test]
    async fn rule3_strips_service_prefix_and_restarts() {
        let lookup = FakeLookup::default();
        let portal = PortalId::dm_phone("tel:+14155551111");
        lookup
            .by_reference
            .lock()
            .unwrap()
            .insert("+14155551111".into(), portal.clone());
        let input = ResolutionInput {
            reference: Some("iMessage;-;+14155551111"),
            ..Default::default()
        };
        assert_eq!(resolve_portal(&lookup, input).await, Some(portal));
    }

    #[tokio::test]
    async fn rule4_non_self_sender_normalizes() {
        let lookup = FakeLookup::default();
        let input = ResolutionInput {
            reference: None,
            is_group: None,
            sender_uri: Some("4155551111"),
            is_from_me: false,
        };
        assert_eq!(
            resolve_portal(&lookup, input).await,
            Some(PortalId::dm_phone("tel:+14155551111"))
        );
    }

    #[tokio::test]
    async fn rule6_unresolved_is_none_never_invents() {
        let lookup = FakeLookup::default();
        let input = ResolutionInput {
            reference: Some("totally-unknown-chat"),
            is_group: Some(false),
            sender_uri: None,
            is_from_me: false,
        };
        assert_eq!(resolve_portal(&lookup, input).await, None);
    }

    #[test]
    fn group_discrimination_by_count_or_name() {
        assert!(classify_push_conversation(3, false));
        assert!(classify_push_conversation(2, true));
        assert!(!classify_push_conversation(2, false));
    }
}
