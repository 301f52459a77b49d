// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Realtime Dispatcher: consumes push events,
//! classifies them, suppresses echoes, forwards the rest to the sink.

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod sink;

pub use dispatcher::{Dispatcher, DispatcherRole};
pub use error::{DispatchError, DispatchResult};
pub use event::{PushEvent, SinkEvent};
pub use sink::Sink;

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use imbridge_common::{Chat, ChatReference, ChatService, ChatStyle, PortalId};
    use imbridge_store::{ChatUpsert, ShadowStore};
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(PortalId, String)>>,
        invalidations: Mutex<u32>,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn queue_event(&self, portal: &PortalId, event: SinkEvent) -> DispatchResult<()> {
            let label = match &event {
                SinkEvent::Message { guid, .. } => format!("message:{guid}"),
                SinkEvent::DeliveryReceipt { target_guid } => format!("delivery:{target_guid}"),
                SinkEvent::Unsend { target_guid } => format!("unsend:{target_guid}"),
                other => format!("{other:?}"),
            };
            self.events.lock().unwrap().push((portal.clone(), label));
            Ok(())
        }

        async fn upload_media(&self, _bytes: Vec<u8>, _name: &str, _mime: &str) -> DispatchResult<String> {
            Ok("media-ref".to_string())
        }

        async fn get_existing_portal(&self, _portal: &PortalId) -> Option<String> {
            None
        }

        async fn invalidate_peer_cache(&self) -> DispatchResult<()> {
            *self.invalidations.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn sample_message_event(guid: &str, chat_id: &str) -> PushEvent {
        PushEvent::Message {
            guid: guid.to_string(),
            chat_reference: ChatReference::ChatIdentifier(chat_id.to_string()),
            participant_count: 1,
            group_name: None,
            sender: Some("tel:+14155551111".to_string()),
            is_from_me: false,
            text: Some("hi".to_string()),
            subject: None,
            attachments: vec![],
            timestamp_ms: 1_000,
            service: ChatService::Primary,
            send_delivered: false,
        }
    }

    async fn seeded_store_with_dm_chat(chat_id: &str, portal: PortalId) -> ShadowStore {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        store
            .upsert_chat(&[ChatUpsert {
                chat: Chat {
                    chat_identifier: chat_id.to_string(),
                    group_id: None,
                    record_name: format!("rec-{chat_id}"),
                    style: ChatStyle::Dm,
                    service: ChatService::Primary,
                    display_name: None,
                    participants: std::collections::BTreeSet::from(["tel:+14155551111".to_string()]),
                    updated_timestamp: chrono::Utc::now(),
                    original_group_id: None,
                },
                portal_id: Some(portal),
                needs_reconciliation: false,
            }])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn resolved_message_is_persisted_and_forwarded() {
        let portal = PortalId::dm_phone("tel:+14155551111");
        let store = seeded_store_with_dm_chat("chat-1", portal.clone()).await;
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(store.clone(), sink);

        dispatcher
            .handle_event(sample_message_event("msg-1", "chat-1"))
            .await
            .unwrap();

        assert!(store.has_message("msg-1").await.unwrap());
        let events = dispatcher.sink.events.lock().unwrap().clone();
        assert_eq!(events, vec![(portal, "message:msg-1".to_string())]);
    }

    #[tokio::test]
    async fn store_echo_is_dropped_without_reforwarding() {
        let portal = PortalId::dm_phone("tel:+14155551111");
        let store = seeded_store_with_dm_chat("chat-1", portal.clone()).await;
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(store.clone(), sink);

        dispatcher
            .handle_event(sample_message_event("msg-1", "chat-1"))
            .await
            .unwrap();
        dispatcher
            .handle_event(sample_message_event("msg-1", "chat-1"))
            .await
            .unwrap();

        let events = dispatcher.sink.events.lock().unwrap().clone();
        assert_eq!(events.len(), 1, "second delivery of the same guid must be dropped as an echo");
    }

    #[tokio::test]
    async fn unsend_tracked_guid_suppresses_redelivery() {
        let portal = PortalId::dm_phone("tel:+14155551111");
        let store = seeded_store_with_dm_chat("chat-1", portal).await;
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(store.clone(), sink);

        dispatcher.mark_unsent("msg-1".to_string()).await;
        dispatcher
            .handle_event(sample_message_event("msg-1", "chat-1"))
            .await
            .unwrap();

        assert!(!store.has_message("msg-1").await.unwrap());
        assert!(dispatcher.sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_ack_is_forwarded_distinct_from_message() {
        let portal = PortalId::dm_phone("tel:+14155551111");
        let store = seeded_store_with_dm_chat("chat-1", portal.clone()).await;
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(store.clone(), sink);

        let mut event = sample_message_event("msg-1", "chat-1");
        if let PushEvent::Message { send_delivered, .. } = &mut event {
            *send_delivered = true;
        }
        dispatcher.handle_event(event).await.unwrap();

        let events = dispatcher.sink.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                (portal.clone(), "message:msg-1".to_string()),
                (portal, "delivery:msg-1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn unresolvable_group_message_gets_a_provisional_portal() {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(store.clone(), sink);

        let mut event = sample_message_event("msg-1", "chat-unknown");
        if let PushEvent::Message { participant_count, sender, .. } = &mut event {
            *participant_count = 5;
            *sender = None;
        }
        dispatcher.handle_event(event).await.unwrap();

        assert!(store.has_message("msg-1").await.unwrap());
        let events = dispatcher.sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].0.is_group());
    }

    #[tokio::test]
    async fn tombstoned_portal_blocks_delayed_message_but_allows_later_one() {
        let portal = PortalId::group(Uuid::new_v4());
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        store
            .record_deletion_tombstone(&portal, chrono::Utc::now(), "hash-1")
            .await
            .unwrap();
        store
            .upsert_chat(&[ChatUpsert {
                chat: Chat {
                    chat_identifier: "chat-group".to_string(),
                    group_id: Some(match &portal {
                        PortalId::Group(g) => *g,
                        _ => unreachable!(),
                    }),
                    record_name: "rec-group".to_string(),
                    style: ChatStyle::Group,
                    service: ChatService::Primary,
                    display_name: None,
                    participants: Default::default(),
                    updated_timestamp: chrono::Utc::now(),
                    original_group_id: None,
                },
                portal_id: Some(portal.clone()),
                needs_reconciliation: false,
            }])
            .await
            .unwrap();
        let sink = RecordingSink::default();
        let dispatcher = Dispatcher::new(store.clone(), sink);

        let mut delayed = sample_message_event("msg-old", "chat-group");
        if let PushEvent::Message { chat_reference, timestamp_ms, .. } = &mut delayed {
            *chat_reference = ChatReference::GroupId(match &portal {
                PortalId::Group(g) => g.to_string(),
                _ => unreachable!(),
            });
            *timestamp_ms = -1;
        }
        dispatcher.handle_event(delayed).await.unwrap();
        assert!(dispatcher.sink.events.lock().unwrap().is_empty());
        assert!(store.find_tombstone(&portal).await.unwrap().is_some());

        let mut later = sample_message_event("msg-new", "chat-group");
        if let PushEvent::Message { chat_reference, timestamp_ms, .. } = &mut later {
            *chat_reference = ChatReference::GroupId(match &portal {
                PortalId::Group(g) => g.to_string(),
                _ => unreachable!(),
            });
            *timestamp_ms = chrono::Utc::now().timestamp_millis() + 60_000;
        }
        dispatcher.handle_event(later).await.unwrap();
        assert!(store.find_tombstone(&portal).await.unwrap().is_none());
        assert_eq!(dispatcher.sink.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn secondary_dispatcher_persists_but_does_not_forward() {
        let portal = PortalId::dm_phone("tel:+14155551111");
        let store = seeded_store_with_dm_chat("chat-1", portal).await;
        let sink = RecordingSink::default();
        let dispatcher =
            Dispatcher::with_role(store.clone(), sink, imbridge_resolver::NoContacts, DispatcherRole::Secondary);

        dispatcher
            .handle_event(sample_message_event("msg-1", "chat-1"))
            .await
            .unwrap();

        assert!(store.has_message("msg-1").await.unwrap(), "secondary stream must still persist for backfill");
        assert!(dispatcher.sink.events.lock().unwrap().is_empty(), "secondary stream must not forward to the sink");
    }
}
