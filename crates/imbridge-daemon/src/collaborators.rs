// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Placeholder collaborators for the process-boundary traits this binary
//! does not itself implement: the iMessage protocol client, the cloud
//! backup service, the Matrix-side sink, and the attachment transport.
//! Wiring real implementations in here is the daemon's only integration
//! seam; everything upstream of this module is protocol-agnostic.

use async_trait::async_trait;
use imbridge_auth::ciphersuite::BridgeCipherSuite;
use imbridge_auth::{AuthError, AuthResult, AuthServiceClient, LoginOutcome};
use imbridge_backfill::{AttachmentFetcher, BackfillError, BackfillResult};
use imbridge_common::{AttachmentMeta, PortalId, TapbackType};
use imbridge_dispatch::{DispatchError, DispatchResult, Sink, SinkEvent};
use imbridge_outbound::{ConversationTarget, OutboundError, OutboundResult, PushClient};
use imbridge_sync::{
    CloudSyncClient, DecodedChatFields, DecodedMessageFields, Decryptor, RawRecord, SyncError, SyncPage, SyncResult,
};
use opaque_ke::{CredentialFinalization, CredentialRequest, CredentialResponse};

const NOT_WIRED: &str = "no protocol collaborator wired into this daemon build";

pub struct UnimplementedAuthServiceClient;

#[async_trait]
impl AuthServiceClient for UnimplementedAuthServiceClient {
    async fn start_login(
        &self,
        _user_id: &str,
        _request: CredentialRequest<BridgeCipherSuite>,
    ) -> AuthResult<CredentialResponse<BridgeCipherSuite>> {
        Err(AuthError::Transient(NOT_WIRED.to_string()))
    }

    async fn finish_login(
        &self,
        _user_id: &str,
        _finalization: CredentialFinalization<BridgeCipherSuite>,
    ) -> AuthResult<LoginOutcome> {
        Err(AuthError::Transient(NOT_WIRED.to_string()))
    }

    async fn submit_two_factor(&self, _user_id: &str, _code: &str) -> AuthResult<LoginOutcome> {
        Err(AuthError::Transient(NOT_WIRED.to_string()))
    }

    async fn reauthenticate(
        &self,
        _user_id: &str,
        _hashed_password: &[u8],
        _machine_identity: &[u8],
    ) -> AuthResult<LoginOutcome> {
        Err(AuthError::Transient(NOT_WIRED.to_string()))
    }

    async fn refresh_delegate(&self, _pet: &[u8]) -> AuthResult<imbridge_common::ServiceDelegateToken> {
        Err(AuthError::Transient(NOT_WIRED.to_string()))
    }
}

pub struct UnimplementedCloudSyncClient;

#[async_trait]
impl CloudSyncClient for UnimplementedCloudSyncClient {
    async fn sync_chats(&self, _token: Option<Vec<u8>>) -> SyncResult<SyncPage> {
        Err(SyncError::Transient(NOT_WIRED.to_string()))
    }

    async fn sync_messages(&self, _token: Option<Vec<u8>>) -> SyncResult<SyncPage> {
        Err(SyncError::Transient(NOT_WIRED.to_string()))
    }
}

pub struct UnimplementedDecryptor;

#[async_trait]
impl Decryptor for UnimplementedDecryptor {
    async fn decrypt_chat(&self, _raw: &RawRecord) -> SyncResult<Option<DecodedChatFields>> {
        Ok(None)
    }

    async fn decrypt_message(&self, _raw: &RawRecord) -> SyncResult<Option<DecodedMessageFields>> {
        Ok(None)
    }
}

pub struct UnimplementedSink;

#[async_trait]
impl Sink for UnimplementedSink {
    async fn queue_event(&self, portal: &PortalId, _event: SinkEvent) -> DispatchResult<()> {
        Err(DispatchError::Sink(format!("{NOT_WIRED} (portal {portal})")))
    }

    async fn upload_media(&self, _bytes: Vec<u8>, _name: &str, _mime: &str) -> DispatchResult<String> {
        Err(DispatchError::Sink(NOT_WIRED.to_string()))
    }

    async fn get_existing_portal(&self, _portal: &PortalId) -> Option<String> {
        None
    }

    async fn invalidate_peer_cache(&self) -> DispatchResult<()> {
        Ok(())
    }
}

pub struct UnimplementedPushClient;

#[async_trait]
impl PushClient for UnimplementedPushClient {
    async fn send_text(&self, _target: &ConversationTarget, _text: &str) -> OutboundResult<String> {
        Err(OutboundError::Push(NOT_WIRED.to_string()))
    }

    async fn send_attachment(
        &self,
        _target: &ConversationTarget,
        _bytes: Vec<u8>,
        _mime: &str,
        _filename: &str,
    ) -> OutboundResult<String> {
        Err(OutboundError::Push(NOT_WIRED.to_string()))
    }

    async fn send_edit(&self, _target: &ConversationTarget, _target_guid: &str, _new_text: &str) -> OutboundResult<()> {
        Err(OutboundError::Push(NOT_WIRED.to_string()))
    }

    async fn send_unsend(&self, _target: &ConversationTarget, _target_guid: &str) -> OutboundResult<()> {
        Err(OutboundError::Push(NOT_WIRED.to_string()))
    }

    async fn send_reaction(
        &self,
        _target: &ConversationTarget,
        _target_guid: &str,
        _tapback_type: TapbackType,
        _add: bool,
    ) -> OutboundResult<()> {
        Err(OutboundError::Push(NOT_WIRED.to_string()))
    }

    async fn send_typing(&self, _target: &ConversationTarget, _on: bool) -> OutboundResult<()> {
        Err(OutboundError::Push(NOT_WIRED.to_string()))
    }

    async fn send_read_receipt(&self, _target: &ConversationTarget, _up_to_guid: &str) -> OutboundResult<()> {
        Err(OutboundError::Push(NOT_WIRED.to_string()))
    }

    async fn send_delivery_receipt(&self, _target: &ConversationTarget, _for_guid: &str) -> OutboundResult<()> {
        Err(OutboundError::Push(NOT_WIRED.to_string()))
    }
}

pub struct UnimplementedAttachmentFetcher;

#[async_trait]
impl AttachmentFetcher for UnimplementedAttachmentFetcher {
    async fn fetch(&self, _meta: &AttachmentMeta) -> BackfillResult<(String, String)> {
        Err(BackfillError::Fetch(NOT_WIRED.to_string()))
    }
}
