// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Durable local shadow cache: chats, messages, sync
//! tokens, deletion tombstones and chat aliases, backed by SQLite.

mod aliases;
mod attachments;
mod chats;
mod codec;
mod error;
mod lookup_impl;
mod messages;
mod pool;
mod store;
mod sync_tokens;
mod tombstones;

pub use attachments::AttachmentCacheEntry;
pub use chats::ChatUpsert;
pub use error::{StoreError, StoreResult};
pub use messages::MessageUpsert;
pub use store::{ShadowStore, MAX_BATCH_ROWS};

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use imbridge_common::{
        Chat, ChatService, ChatStyle, Message, PortalId, Zone,
    };
    use imbridge_resolver::ChatLookup;
    use uuid::Uuid;

    use super::*;

    fn sample_chat(id: &str, portal: PortalId) -> ChatUpsert {
        ChatUpsert {
            chat: Chat {
                chat_identifier: id.to_string(),
                group_id: None,
                record_name: format!("rec-{id}"),
                style: ChatStyle::Dm,
                service: ChatService::Primary,
                display_name: None,
                participants: BTreeSet::from(["tel:+15551234567".to_string()]),
                updated_timestamp: Utc::now(),
                original_group_id: None,
            },
            portal_id: Some(portal),
            needs_reconciliation: false,
        }
    }

    fn sample_message(guid: &str, portal: PortalId, ts: i64, deleted: bool) -> MessageUpsert {
        MessageUpsert {
            message: Message {
                guid: guid.to_string(),
                record_name: Some(format!("rec-{guid}")),
                portal_id: Some(portal),
                timestamp_ms: ts,
                sender: None,
                is_from_me: true,
                text: Some("hello".to_string()),
                subject: None,
                service: ChatService::Primary,
                deleted,
                tapback: None,
                edit: None,
                attachments: vec![],
            },
            chat_id: Some("chat-1".to_string()),
        }
    }

    #[tokio::test]
    async fn has_chat_reflects_upsert() {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        let portal = PortalId::dm_phone("tel:+15551234567");
        assert!(!store.has_chat("chat-1").await.unwrap());
        store
            .upsert_chat(&[sample_chat("chat-1", portal)])
            .await
            .unwrap();
        assert!(store.has_chat("chat-1").await.unwrap());
    }

    #[tokio::test]
    async fn has_message_ignores_deleted_flag() {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        let portal = PortalId::dm_phone("tel:+15551234567");
        store
            .upsert_message(&[sample_message("msg-1", portal, 1000, true)])
            .await
            .unwrap();
        assert!(store.has_message("msg-1").await.unwrap());
    }

    #[tokio::test]
    async fn upsert_never_undeletes() {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        let portal = PortalId::dm_phone("tel:+15551234567");
        store
            .upsert_message(&[sample_message("msg-1", portal.clone(), 1000, true)])
            .await
            .unwrap();
        store
            .upsert_message(&[sample_message("msg-1", portal.clone(), 1000, false)])
            .await
            .unwrap();
        let msgs = store.list_backward_messages(&portal, None, 10).await.unwrap();
        assert!(msgs.is_empty(), "tombstoned message must stay hidden from listings");
    }

    #[tokio::test]
    async fn forward_and_backward_ordering() {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        let portal = PortalId::dm_phone("tel:+15551234567");
        store
            .upsert_message(&[
                sample_message("a", portal.clone(), 100, false),
                sample_message("b", portal.clone(), 200, false),
                sample_message("c", portal.clone(), 300, false),
            ])
            .await
            .unwrap();

        let forward = store.list_forward_messages(&portal, None, 10).await.unwrap();
        let forward_guids: Vec<&str> = forward.iter().map(|m| m.guid.as_str()).collect();
        assert_eq!(forward_guids, vec!["a", "b", "c"]);

        let backward = store.list_backward_messages(&portal, None, 10).await.unwrap();
        let backward_guids: Vec<&str> = backward.iter().map(|m| m.guid.as_str()).collect();
        assert_eq!(backward_guids, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn sync_token_roundtrip() {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        assert!(store.get_sync_token(Zone::Chats).await.unwrap().is_none());
        store
            .set_sync_token_success(Zone::Chats, Some(b"cursor-1"))
            .await
            .unwrap();
        let state = store.get_sync_token(Zone::Chats).await.unwrap().unwrap();
        assert_eq!(state.continuation_token.as_deref(), Some(&b"cursor-1"[..]));
        assert!(state.last_error.is_none());

        store.set_sync_token_error(Zone::Chats, "timeout").await.unwrap();
        let state = store.get_sync_token(Zone::Chats).await.unwrap().unwrap();
        assert_eq!(state.continuation_token.as_deref(), Some(&b"cursor-1"[..]));
        assert_eq!(state.last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn tombstone_lifecycle() {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        let portal = PortalId::group(Uuid::nil());
        assert!(store.find_tombstone(&portal).await.unwrap().is_none());
        store
            .record_deletion_tombstone(&portal, Utc::now(), "hash-1")
            .await
            .unwrap();
        assert!(store.find_tombstone(&portal).await.unwrap().is_some());
        store.clear_deletion_tombstone(&portal).await.unwrap();
        assert!(store.find_tombstone(&portal).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn chat_lookup_trait_resolves_portal() {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        let portal = PortalId::dm_phone("tel:+15551234567");
        store
            .upsert_chat(&[sample_chat("chat-1", portal.clone())])
            .await
            .unwrap();
        let found = ChatLookup::find_chat_portal(&store, "chat-1").await;
        assert_eq!(found, Some(portal));
    }
}
