// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod config;
pub mod credentials;
pub mod model;
pub mod portal;
pub mod sync_state;
pub mod tombstone;

pub use config::BridgeConfig;
pub use credentials::{
    AuthState, CredentialBundle, LongLivedCredentials, PasswordEquivalentToken, ServiceDelegateToken,
};
pub use model::{
    AttachmentMeta, Chat, ChatReference, ChatService, ChatStyle, EditDescriptor, FailedAttachmentEntry,
    Message, TapbackDescriptor, TapbackType, MAX_ATTACHMENT_ATTEMPTS,
};
pub use portal::{PortalId, PortalIdError};
pub use sync_state::{SyncState, Zone};
pub use tombstone::DeletionTombstone;
