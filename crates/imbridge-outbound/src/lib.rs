// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Translates sink-originated actions (sends, edits, reactions, typing,
//! receipts) into protocol-client calls, and marks our own unsends so the
//! dispatcher can suppress their eventual echo.

pub mod adapter;
pub mod audio;
pub mod error;
pub mod push;

pub use adapter::OutboundAdapter;
pub use audio::{caf_opus_to_ogg, ogg_opus_to_caf};
pub use error::{OutboundError, OutboundResult};
pub use push::{translate_target, ConversationTarget, PushClient};

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use imbridge_common::{PortalId, TapbackType};
    use imbridge_dispatch::{Dispatcher, DispatchResult, Sink, SinkEvent};
    use imbridge_store::ShadowStore;
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct RecordingPushClient {
        calls: Mutex<Vec<(ConversationTarget, String)>>,
    }

    impl RecordingPushClient {
        fn record(&self, target: &ConversationTarget, label: impl Into<String>) {
            self.calls.lock().unwrap().push((target.clone(), label.into()));
        }
    }

    #[async_trait]
    impl PushClient for RecordingPushClient {
        async fn send_text(&self, target: &ConversationTarget, text: &str) -> OutboundResult<String> {
            self.record(target, format!("text:{text}"));
            Ok("sent-guid".to_string())
        }

        async fn send_attachment(
            &self,
            target: &ConversationTarget,
            _bytes: Vec<u8>,
            mime: &str,
            _filename: &str,
        ) -> OutboundResult<String> {
            self.record(target, format!("attachment:{mime}"));
            Ok("sent-guid".to_string())
        }

        async fn send_edit(&self, target: &ConversationTarget, target_guid: &str, new_text: &str) -> OutboundResult<()> {
            self.record(target, format!("edit:{target_guid}:{new_text}"));
            Ok(())
        }

        async fn send_unsend(&self, target: &ConversationTarget, target_guid: &str) -> OutboundResult<()> {
            self.record(target, format!("unsend:{target_guid}"));
            Ok(())
        }

        async fn send_reaction(
            &self,
            target: &ConversationTarget,
            target_guid: &str,
            tapback_type: TapbackType,
            add: bool,
        ) -> OutboundResult<()> {
            self.record(target, format!("reaction:{target_guid}:{tapback_type:?}:{add}"));
            Ok(())
        }

        async fn send_typing(&self, target: &ConversationTarget, on: bool) -> OutboundResult<()> {
            self.record(target, format!("typing:{on}"));
            Ok(())
        }

        async fn send_read_receipt(&self, target: &ConversationTarget, up_to_guid: &str) -> OutboundResult<()> {
            self.record(target, format!("read:{up_to_guid}"));
            Ok(())
        }

        async fn send_delivery_receipt(&self, target: &ConversationTarget, for_guid: &str) -> OutboundResult<()> {
            self.record(target, format!("delivered:{for_guid}"));
            Ok(())
        }
    }

    #[derive(Default)]
    struct NullSink;

    #[async_trait]
    impl Sink for NullSink {
        async fn queue_event(&self, _portal: &PortalId, _event: SinkEvent) -> DispatchResult<()> {
            Ok(())
        }

        async fn upload_media(&self, _bytes: Vec<u8>, _name: &str, _mime: &str) -> DispatchResult<String> {
            Ok("media-ref".to_string())
        }

        async fn get_existing_portal(&self, _portal: &PortalId) -> Option<String> {
            None
        }

        async fn invalidate_peer_cache(&self) -> DispatchResult<()> {
            Ok(())
        }
    }

    async fn sample_adapter() -> OutboundAdapter<RecordingPushClient, NullSink> {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        let dispatcher = Dispatcher::new(store, NullSink);
        OutboundAdapter::new(RecordingPushClient::default(), dispatcher, "tel:+14155550000")
    }

    #[tokio::test]
    async fn send_text_to_a_group_portal_carries_the_group_id_as_sender_guid() {
        let adapter = sample_adapter().await;
        let group_id = Uuid::new_v4();
        let portal = PortalId::group(group_id);

        adapter.send_text(&portal, "hello").await.unwrap();

        let calls = adapter.push.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(ConversationTarget::Group { sender_guid: group_id }, "text:hello".to_string())]);
    }

    #[tokio::test]
    async fn send_text_to_a_dm_portal_carries_self_and_remote_as_participants() {
        let adapter = sample_adapter().await;
        let portal = PortalId::dm_phone("tel:+14155551111");

        adapter.send_text(&portal, "hi there").await.unwrap();

        let calls = adapter.push.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![(
                ConversationTarget::Dm {
                    participants: ["tel:+14155550000".to_string(), "tel:+14155551111".to_string()]
                },
                "text:hi there".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn send_attachment_remuxes_ogg_opus_to_caf_before_reaching_the_protocol_client() {
        let adapter = sample_adapter().await;
        let portal = PortalId::dm_phone("tel:+14155551111");

        let mut ogg_bytes = Vec::new();
        {
            let mut writer = ogg::writing::PacketWriter::new(&mut ogg_bytes);
            let mut head = Vec::new();
            head.extend_from_slice(b"OpusHead");
            head.push(1);
            head.push(1);
            head.extend_from_slice(&312u16.to_le_bytes());
            head.extend_from_slice(&48_000u32.to_le_bytes());
            head.extend_from_slice(&0i16.to_le_bytes());
            head.push(0);
            let mut tags = Vec::new();
            tags.extend_from_slice(b"OpusTags");
            tags.extend_from_slice(&0u32.to_le_bytes());
            tags.extend_from_slice(&0u32.to_le_bytes());
            writer.write_packet(head, 1, ogg::writing::PacketWriteEndInfo::EndPage, 0).unwrap();
            writer.write_packet(tags, 1, ogg::writing::PacketWriteEndInfo::EndPage, 0).unwrap();
            writer
                .write_packet(vec![0x00, 0xab], 1, ogg::writing::PacketWriteEndInfo::EndStream, 480)
                .unwrap();
        }

        adapter.send_attachment(&portal, ogg_bytes, "audio/ogg", "voice.ogg").await.unwrap();

        let calls = adapter.push.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "attachment:audio/x-caf");
    }

    #[tokio::test]
    async fn send_attachment_leaves_non_audio_mime_types_untouched() {
        let adapter = sample_adapter().await;
        let portal = PortalId::dm_phone("tel:+14155551111");

        adapter.send_attachment(&portal, vec![1, 2, 3], "image/png", "photo.png").await.unwrap();

        let calls = adapter.push.calls.lock().unwrap().clone();
        assert_eq!(calls[0].1, "attachment:image/png");
    }

    #[tokio::test]
    async fn send_unsend_marks_the_guid_before_asking_the_protocol_client_to_unsend() {
        let store = ShadowStore::open_in_memory("login-1").await.unwrap();
        let dispatcher = Dispatcher::new(store.clone(), NullSink);
        let adapter = OutboundAdapter::new(RecordingPushClient::default(), dispatcher.clone(), "tel:+14155550000");
        let portal = PortalId::dm_phone("tel:+14155551111");

        adapter.send_unsend(&portal, "msg-1").await.unwrap();

        let calls = adapter.push.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(
            ConversationTarget::Dm { participants: ["tel:+14155550000".to_string(), "tel:+14155551111".to_string()] },
            "unsend:msg-1".to_string()
        )]);

        let event = imbridge_dispatch::PushEvent::Message {
            guid: "msg-1".to_string(),
            chat_reference: imbridge_common::ChatReference::ChatIdentifier("chat-1".to_string()),
            participant_count: 1,
            group_name: None,
            sender: Some("tel:+14155551111".to_string()),
            is_from_me: false,
            text: Some("echo of our unsend".to_string()),
            subject: None,
            attachments: vec![],
            timestamp_ms: 1,
            service: imbridge_common::ChatService::Primary,
            send_delivered: false,
        };
        dispatcher.handle_event(event).await.unwrap();
        assert!(!store.has_message("msg-1").await.unwrap(), "redelivery of our own unsend must be suppressed");
    }

    #[tokio::test]
    async fn send_reaction_and_typing_and_receipts_all_translate_the_portal() {
        let adapter = sample_adapter().await;
        let portal = PortalId::group(Uuid::new_v4());

        adapter.send_reaction(&portal, "msg-1", TapbackType::Love, true).await.unwrap();
        adapter.send_typing(&portal, true).await.unwrap();
        adapter.send_read_receipt(&portal, "msg-1").await.unwrap();
        adapter.send_delivery_receipt(&portal, "msg-1").await.unwrap();
        adapter.send_edit(&portal, "msg-1", "edited text").await.unwrap();

        let calls = adapter.push.calls.lock().unwrap().clone();
        let labels: Vec<String> = calls.into_iter().map(|(_, label)| label).collect();
        assert_eq!(
            labels,
            vec![
                "reaction:msg-1:Love:true".to_string(),
                "typing:true".to_string(),
                "read:msg-1".to_string(),
                "delivered:msg-1".to_string(),
                "edit:msg-1:edited text".to_string(),
            ]
        );
    }
}
