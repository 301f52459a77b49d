// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] imbridge_store::StoreError),
    #[error("transient cloud-sync error: {0}")]
    Transient(String),
    #[error("transient decryption error: {0}")]
    DecryptTransient(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
