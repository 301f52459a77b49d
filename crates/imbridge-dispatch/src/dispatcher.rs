// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Realtime Dispatcher: classifies push events,
//! suppresses echoes of our own sends, and forwards the rest to the sink.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use imbridge_common::{Chat, ChatReference, ChatService, ChatStyle, Message, PortalId};
use imbridge_resolver::{
    classify_push_conversation, merge_portal, reconcile_group_alias, resolve_portal, ContactSource,
    NoContacts, ResolutionInput,
};
use imbridge_store::{ChatUpsert, MessageUpsert, ShadowStore};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DispatchResult;
use crate::event::{PushEvent, SinkEvent};
use crate::sink::Sink;

/// Window within which a guid we marked as "unsent by us" is treated as an
/// echo rather than a genuine redelivery.
const ECHO_SUPPRESSION_MINUTES: i64 = 5;

/// Whether this dispatcher is the one live realtime source allowed to
/// forward to the sink, or a secondary/legacy stream running alongside it.
/// When two realtime sources are both active, only the primary forwards;
/// the secondary still persists to the shadow store (so its messages are
/// available for backfill/reconciliation) but never calls the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatcherRole {
    #[default]
    Primary,
    Secondary,
}

pub struct Dispatcher<S, C = NoContacts> {
    store: ShadowStore,
    pub(crate) sink: S,
    contacts: C,
    role: DispatcherRole,
    recently_unsent: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl<S: Sink> Dispatcher<S, NoContacts> {
    pub fn new(store: ShadowStore, sink: S) -> Arc<Self> {
        Self::with_contacts(store, sink, NoContacts)
    }
}

impl<S: Sink, C: ContactSource> Dispatcher<S, C> {
    pub fn with_contacts(store: ShadowStore, sink: S, contacts: C) -> Arc<Self> {
        Self::with_role(store, sink, contacts, DispatcherRole::Primary)
    }

    /// Same as [`Self::with_contacts`] but with an explicit realtime role.
    /// Use [`DispatcherRole::Secondary`] for an auxiliary/legacy stream that
    /// must keep the shadow store current without duplicating forwarded
    /// events from the primary stream.
    pub fn with_role(store: ShadowStore, sink: S, contacts: C, role: DispatcherRole) -> Arc<Self> {
        Arc::new(Self {
            store,
            sink,
            contacts,
            role,
            recently_unsent: Mutex::new(HashMap::new()),
        })
    }

    fn is_primary(&self) -> bool {
        self.role == DispatcherRole::Primary
    }

    /// Forwards to the sink unless this dispatcher is a secondary/auxiliary
    /// stream, in which case the event is dropped after persistence has
    /// already happened in the caller.
    async fn forward(&self, portal: &PortalId, event: SinkEvent) -> DispatchResult<()> {
        if !self.is_primary() {
            debug!(portal = %portal, "secondary dispatcher: not forwarding, backfill/auxiliary only");
            return Ok(());
        }
        self.sink.queue_event(portal, event).await
    }

    /// Records that we just asked the protocol client to unsend a message.
    /// Called by the outbound adapter, not by this crate's own event handling.
    pub async fn mark_unsent(&self, guid: String) {
        let mut map = self.recently_unsent.lock().await;
        map.insert(guid, Utc::now());
    }

    pub async fn handle_event(&self, event: PushEvent) -> DispatchResult<()> {
        match event {
            PushEvent::Message {
                guid,
                chat_reference,
                participant_count,
                group_name,
                sender,
                is_from_me,
                text,
                subject,
                attachments,
                timestamp_ms,
                service,
                send_delivered,
            } => {
                self.handle_message(
                    guid,
                    chat_reference,
                    participant_count,
                    group_name,
                    sender,
                    is_from_me,
                    text,
                    subject,
                    attachments,
                    timestamp_ms,
                    service,
                    send_delivered,
                )
                .await
            }
            PushEvent::Tapback {
                chat_reference,
                sender,
                is_from_me,
                target_guid,
                tapback_type,
                emoji,
                remove,
            } => {
                let Some(portal) = self
                    .resolve_chat_scoped_portal(&chat_reference, sender.as_deref(), is_from_me)
                    .await
                else {
                    warn!(%target_guid, "dropping tapback: could not resolve its chat");
                    return Ok(());
                };
                self
                    .forward(
                        &portal,
                        SinkEvent::Tapback { sender, target_guid, tapback_type, emoji, remove },
                    )
                    .await
            }
            PushEvent::Edit { chat_reference, target_guid, new_text } => {
                let Some(portal) = self
                    .resolve_chat_scoped_portal(&chat_reference, None, false)
                    .await
                else {
                    warn!(%target_guid, "dropping edit: could not resolve its chat");
                    return Ok(());
                };
                self
                    .forward(&portal, SinkEvent::Edit { target_guid, new_text })
                    .await
            }
            PushEvent::Unsend { target_guid } => {
                let Some(portal) = self.store.find_portal_for_message(&target_guid).await? else {
                    warn!(%target_guid, "dropping unsend: target message has no known portal");
                    return Ok(());
                };
                self
                    .forward(&portal, SinkEvent::Unsend { target_guid })
                    .await
            }
            PushEvent::ReadReceipt { target_guid, reader } => {
                let Some(portal) = self.store.find_portal_for_message(&target_guid).await? else {
                    warn!(%target_guid, "dropping read receipt: target message has no known portal");
                    return Ok(());
                };
                self
                    .forward(&portal, SinkEvent::ReadReceipt { target_guid, reader })
                    .await
            }
            PushEvent::DeliveryReceipt { target_guid } => {
                let Some(portal) = self.store.find_portal_for_message(&target_guid).await? else {
                    warn!(%target_guid, "dropping delivery receipt: target message has no known portal");
                    return Ok(());
                };
                self
                    .forward(&portal, SinkEvent::DeliveryReceipt { target_guid })
                    .await
            }
            PushEvent::Typing { chat_reference, participant, on } => {
                let Some(portal) = self
                    .resolve_chat_scoped_portal(&chat_reference, participant.as_deref(), false)
                    .await
                else {
                    return Ok(());
                };
                self
                    .forward(&portal, SinkEvent::Typing { participant, on })
                    .await
            }
            PushEvent::ParticipantChange { chat_reference, new_participants } => {
                let Some(portal) = self
                    .resolve_chat_scoped_portal(&chat_reference, None, false)
                    .await
                else {
                    warn!("dropping participant change: could not resolve its chat");
                    return Ok(());
                };
                self
                    .forward(&portal, SinkEvent::ParticipantChange { new_participants })
                    .await
            }
            PushEvent::Rename { chat_reference, new_name } => {
                let Some(portal) = self
                    .resolve_chat_scoped_portal(&chat_reference, None, false)
                    .await
                else {
                    warn!("dropping rename: could not resolve its chat");
                    return Ok(());
                };
                self
                    .forward(&portal, SinkEvent::Rename { new_name })
                    .await
            }
            PushEvent::Error { for_guid, status, status_str } => {
                let Some(portal) = self.store.find_portal_for_message(&for_guid).await? else {
                    warn!(%for_guid, status, "dropping protocol error: target message has no known portal");
                    return Ok(());
                };
                self
                    .forward(&portal, SinkEvent::Error { for_guid, status, status_str })
                    .await
            }
            PushEvent::PeerCacheInvalidate => {
                if !self.is_primary() {
                    debug!("secondary dispatcher: not forwarding peer cache invalidation");
                    return Ok(());
                }
                self.sink.invalidate_peer_cache().await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_message(
        &self,
        guid: String,
        chat_reference: ChatReference,
        participant_count: usize,
        group_name: Option<String>,
        sender: Option<String>,
        is_from_me: bool,
        text: Option<String>,
        subject: Option<String>,
        attachments: Vec<imbridge_common::AttachmentMeta>,
        timestamp_ms: i64,
        service: ChatService,
        send_delivered: bool,
    ) -> DispatchResult<()> {
        {
            let mut unsent = self.recently_unsent.lock().await;
            prune_expired_unsent(&mut unsent);
            if unsent.contains_key(&guid) {
                debug!(%guid, "dropping redelivery tracked as recently unsent by us");
                return Ok(());
            }
        }
        if self.store.has_message(&guid).await? {
            debug!(%guid, "dropping echo already persisted in shadow store");
            return Ok(());
        }

        let reference = chat_reference_str(&chat_reference).to_string();
        let is_group = classify_push_conversation(participant_count, group_name.is_some())
            || matches!(chat_reference, ChatReference::GroupId(_));
        let input = ResolutionInput {
            reference: Some(reference.as_str()),
            is_group: Some(is_group),
            sender_uri: sender.as_deref(),
            is_from_me,
        };
        let mut portal = resolve_portal(&self.store, input).await;

        if portal.is_none() && is_group {
            let reconciled = if let ChatReference::GroupId(raw) = &chat_reference {
                match Uuid::parse_str(raw) {
                    Ok(candidate) => reconcile_group_alias(&self.store, candidate, &BTreeSet::new()).await,
                    Err(_) => None,
                }
            } else {
                None
            };
            portal = Some(match reconciled {
                Some(portal) => portal,
                None => {
                    self.create_provisional_group_portal(&reference, group_name.clone(), service, timestamp_ms)
                        .await?
                }
            });
        }

        let Some(mut portal) = portal else {
            warn!(%guid, "dropping message: resolver could not place it and it is not a group candidate");
            return Ok(());
        };

        if !portal.is_group() {
            portal = merge_portal(&self.contacts, &self.store, portal).await;
        }

        if let Some(tombstone) = self.store.find_tombstone(&portal).await? {
            let message_time = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now);
            if message_time > tombstone.deleted_timestamp {
                info!(portal = %portal, "clearing tombstone: new message is strictly later than deletion");
                self.store.clear_deletion_tombstone(&portal).await?;
                self.store.purge_messages_for_portal(&portal).await?;
            } else {
                debug!(portal = %portal, "dropping delayed message: portal is tombstoned and this message is not later");
                return Ok(());
            }
        }

        let message = Message {
            guid: guid.clone(),
            record_name: None,
            portal_id: Some(portal.clone()),
            timestamp_ms,
            sender: sender.clone(),
            is_from_me,
            text: text.clone(),
            subject: subject.clone(),
            service,
            deleted: false,
            tapback: None,
            edit: None,
            attachments: attachments.clone(),
        };
        self.store
            .upsert_message(&[MessageUpsert { message, chat_id: None }])
            .await?;

        self.forward(
            &portal,
            SinkEvent::Message { guid: guid.clone(), sender, is_from_me, text, subject, attachments, timestamp_ms },
        )
        .await?;

        if send_delivered {
            self.forward(&portal, SinkEvent::DeliveryReceipt { target_guid: guid }).await?;
        }

        Ok(())
    }

    async fn resolve_chat_scoped_portal(
        &self,
        chat_reference: &ChatReference,
        sender: Option<&str>,
        is_from_me: bool,
    ) -> Option<PortalId> {
        let reference = chat_reference_str(chat_reference).to_string();
        let input = ResolutionInput {
            reference: Some(reference.as_str()),
            is_group: Some(matches!(chat_reference, ChatReference::GroupId(_))),
            sender_uri: sender,
            is_from_me,
        };
        let portal = resolve_portal(&self.store, input).await?;
        if portal.is_group() {
            Some(portal)
        } else {
            Some(merge_portal(&self.contacts, &self.store, portal).await)
        }
    }

    /// Conservative handling of the "sender_guid matches no chat AND
    /// participants match no existing group" case: rather than holding
    /// the event, create a fresh `gid:` portal and mark the synthetic
    /// chat row for later reconciliation.
    async fn create_provisional_group_portal(
        &self,
        reference: &str,
        group_name: Option<String>,
        service: ChatService,
        timestamp_ms: i64,
    ) -> DispatchResult<PortalId> {
        let new_uuid = Uuid::new_v4();
        let portal = PortalId::group(new_uuid);
        warn!(reference, portal = %portal, "creating provisional portal for unresolvable group message");
        let updated_timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or_else(Utc::now);
        let chat = Chat {
            chat_identifier: reference.to_string(),
            group_id: Some(new_uuid),
            record_name: format!("provisional-{new_uuid}"),
            style: ChatStyle::Group,
            service,
            display_name: group_name,
            participants: BTreeSet::new(),
            updated_timestamp,
            original_group_id: None,
        };
        self.store
            .upsert_chat(&[ChatUpsert { chat, portal_id: Some(portal.clone()), needs_reconciliation: true }])
            .await?;
        Ok(portal)
    }
}

fn prune_expired_unsent(map: &mut HashMap<String, DateTime<Utc>>) {
    let cutoff = Utc::now() - Duration::minutes(ECHO_SUPPRESSION_MINUTES);
    map.retain(|_, ts| *ts > cutoff);
}

fn chat_reference_str(reference: &ChatReference) -> &str {
    match reference {
        ChatReference::ChatIdentifier(s) => s,
        ChatReference::GroupId(s) => s,
        ChatReference::RecordName(s) => s,
    }
}
