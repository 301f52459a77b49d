// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Cloud Sync Engine: pulls the CHATS then MESSAGES
//! zones page by page, decrypts each record, resolves it to a portal and
//! upserts it into the shadow store.

pub mod client;
pub mod engine;
pub mod error;

pub use client::{CloudSyncClient, DecodedChatFields, DecodedMessageFields, Decryptor, RawRecord, SyncPage};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
